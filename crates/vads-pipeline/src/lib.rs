//! Ad compilation pipeline.
//!
//! Turns a project's scenes and generated media into one finished video:
//! 1. [`resolve_compilation_inputs`] reads the project, scenes and assets
//! 2. [`build_timeline`] picks one visual per scene and derives captions
//! 3. a [`RenderBackend`](vads_render::RenderBackend) renders the timeline
//! 4. [`persist`] uploads the result and records it on the project
//!
//! [`CompileService::compile_project`] runs all four.

pub mod captions;
pub mod compile;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod persister;
pub mod resolver;
pub mod store;
pub mod timeline;

pub use captions::derive_cues;
pub use compile::{CompileResult, CompileService};
pub use config::{BackendKind, PipelineConfig, StorageKind};
pub use error::{CompileError, ErrorKind, PipelineResult};
pub use logging::CompileLogger;
pub use persister::{persist, RenderDetails};
pub use resolver::{resolve_compilation_inputs, CompilationInputs};
pub use store::{MemoryProjectStore, ProjectManifest, ProjectStore, StoreError};
pub use timeline::build_timeline;
