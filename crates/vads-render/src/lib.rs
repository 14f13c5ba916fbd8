//! Render backends for ad compilation.
//!
//! Both backends take a validated [`VideoCompilationOptions`] timeline:
//! - [`RemoteRenderer`] translates it into a declarative edit and polls a
//!   hosted render service for the result URL
//! - [`LocalCompiler`] renders it with FFmpeg in a per-job workspace
//!
//! [`VideoCompilationOptions`]: vads_models::VideoCompilationOptions

pub mod backend;
pub mod error;
pub mod local;
pub mod remote;

pub use backend::{RenderBackend, RenderOutput, RenderedFile};
pub use error::{RenderError, RenderResult, RenderStep};
pub use local::{FfmpegEngine, LocalCompiler, LocalRenderConfig};
pub use remote::{RemoteRenderConfig, RemoteRenderer};
