//! avault-storage: OpenDAL-backed file host and the upload client seam

pub mod client;
pub mod health;
pub mod operator;

pub use client::{classify_error, OpendalUploadClient, UploadClient, FILES_PREFIX};
pub use health::check_health;
pub use operator::{build_operator, check_endpoint, StorageCredentials};
