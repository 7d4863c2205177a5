//! Archiva Core Library
//!
//! This crate provides the domain models, status vocabulary, error types and
//! configuration shared by every Archiva component, together with the two pure
//! algorithms of the control plane: archive destination resolution and upload
//! progress estimation.

pub mod backend_types;
pub mod config;
pub mod constants;
pub mod destination;
pub mod error;
pub mod hooks;
pub mod models;
pub mod upload_progress;

// Re-export commonly used types
pub use backend_types::BackendType;
pub use config::{BatchDownloadSettings, Config, TransferSettings};
pub use destination::resolve_archive_destination;
pub use error::{AppError, AppResult, ErrorMetadata, LogLevel};
pub use hooks::{ByteStream, DataManagementService, DownloadHandle, DownloadMode, TenantConfigStore};
pub use upload_progress::UploadProgressCalculator;
