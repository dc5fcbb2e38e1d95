pub mod config;
pub mod error;
pub mod types;

pub use error::{TransportError, UploadError, UploadResult};
pub use types::{file_url, FileId, UploadMetadata, UploadOutcome};
