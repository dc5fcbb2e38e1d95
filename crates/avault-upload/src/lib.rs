//! avault-upload: the encrypt-digest-upload pipeline
//!
//! ```text
//! plaintext ─► seal_avatar (segmented XChaCha20-Poly1305 + BLAKE3) ─► RetryingUploader ─► UploadClient
//!                                                                          │
//!                                                 success only ◄───────────┘
//!                                                      │
//!                                          MetadataStore::record_upload_metadata
//! ```
//!
//! Each `AvatarUploadPipeline::upload` runs on its own tokio task and resolves
//! an [`UploadHandle`] exactly once. Uploads for the same user should be
//! serialized by the caller; concurrent invocations race on the metadata write.

pub mod key_provider;
pub mod metadata;
pub mod pipeline;
pub mod retry;

pub use key_provider::{EncodedProfileKey, KeyProvider, StaticKeyProvider};
pub use metadata::{JsonMetadataStore, MemoryMetadataStore, MetadataStore};
pub use pipeline::{into_outcome, AvatarUploadPipeline, UploadHandle, UploadSuccess};
pub use retry::{RetryPolicy, RetryingUploader, UploadReceipt};
