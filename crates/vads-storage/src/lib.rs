//! Object storage for compiled ads.
//!
//! - [`ObjectStorage`]: the trait the pipeline persists through
//! - [`S3Storage`]: S3-compatible buckets (Wasabi endpoint by default)
//! - [`LocalStorage`]: a directory on disk, for development
//! - Key layout `{organization_id}/{project_id}/{asset_type}/{file_name}`

pub mod error;
pub mod fetch;
pub mod keys;
pub mod local;
pub mod s3;
pub mod storage;

pub use error::{StorageError, StorageResult};
pub use fetch::SourceLocation;
pub use keys::{asset_key, content_type_for};
pub use local::LocalStorage;
pub use s3::{S3Config, S3Storage};
pub use storage::ObjectStorage;

#[cfg(any(test, feature = "mock"))]
pub use storage::MockObjectStorage;
