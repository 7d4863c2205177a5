//! Archiva Transfer Library
//!
//! This crate provides the `TransferProxy` abstraction over the archive
//! backends and one implementation per backend:
//!
//! - **Object storage** (S3-compatible, via `object_store`): synchronous; calls
//!   return once the bytes are stored.
//! - **Grid transfer** (REST transfer service): synchronous submit; completion
//!   is observed by polling the task status.
//! - **Google Drive** and **Box**: asynchronous; `download` returns a request id
//!   immediately and reports through the progress listener.
//!
//! Operations a backend cannot perform fail with
//! `TransferError::Unsupported` instead of silently doing nothing.

pub mod factory;
#[cfg(any(
    feature = "backend-grid-transfer",
    feature = "backend-cloud-drives",
    feature = "backend-object-storage"
))]
pub(crate) mod http_util;
pub mod progress;
pub mod registry;
pub mod token;
pub mod tracker;
pub mod traits;

#[cfg(feature = "backend-cloud-drives")]
pub mod box_drive;
#[cfg(feature = "backend-cloud-drives")]
pub mod google_drive;
#[cfg(feature = "backend-grid-transfer")]
pub mod grid;
#[cfg(feature = "backend-object-storage")]
pub mod s3;

// Re-export commonly used types
#[cfg(feature = "backend-cloud-drives")]
pub use box_drive::BoxProxy;
pub use factory::create_transfer_proxy;
#[cfg(feature = "backend-cloud-drives")]
pub use google_drive::GoogleDriveProxy;
#[cfg(feature = "backend-grid-transfer")]
pub use grid::GridTransferProxy;
pub use progress::{
    ChannelProgressListener, ProgressEvent, ProgressReporter,
    TransferProgressListener,
};
pub use registry::TransferProxyRegistry;
#[cfg(feature = "backend-object-storage")]
pub use s3::ObjectStorageProxy;
pub use token::AuthToken;
pub use tracker::{TrackedState, TransferSnapshot, TransferTracker};
pub use traits::{TransferError, TransferProxy, TransferResult};
