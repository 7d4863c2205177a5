//! Transfer proxy abstraction trait
//!
//! Every archive backend implements [`TransferProxy`]. Each operation has a
//! default body that fails with [`TransferError::Unsupported`], so a backend
//! only overrides what it can actually do.

use std::sync::Arc;
use std::time::Duration;

use archiva_core::models::{
    ArchiveDestination, DirectoryScanItem, DownloadRequest, DownloadResponse,
    DownloadStatusReport, FileLocation, IntegratedSystemAccount, MetadataEntry, PathAttributes,
    UploadRequest, UploadResponse, UploadStatusReport,
};
use archiva_core::{AppError, BackendType};
use async_trait::async_trait;
use thiserror::Error;

use crate::progress::TransferProgressListener;
use crate::token::AuthToken;

/// Transfer operation errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transfer request: {0}")]
    InvalidRequest(String),

    /// `archive_location` is the computed destination, where a partial
    /// artifact may remain.
    #[error("Upload failed: {message}")]
    UploadFailed {
        message: String,
        archive_location: Option<FileLocation>,
    },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Transfer backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TransferError {
    pub(crate) fn unsupported(backend: BackendType, operation: &str) -> Self {
        TransferError::Unsupported(format!("{} is not supported by {}", operation, backend))
    }

    pub fn upload_failed(message: impl Into<String>) -> Self {
        TransferError::UploadFailed {
            message: message.into(),
            archive_location: None,
        }
    }

    /// Turn any error of an upload into `UploadFailed` carrying its destination.
    pub fn with_archive_location(self, location: FileLocation) -> Self {
        let message = match self {
            TransferError::UploadFailed { message, .. } => message,
            other => other.to_string(),
        };
        TransferError::UploadFailed {
            message,
            archive_location: Some(location),
        }
    }

    pub fn archive_location(&self) -> Option<&FileLocation> {
        match self {
            TransferError::UploadFailed {
                archive_location, ..
            } => archive_location.as_ref(),
            _ => None,
        }
    }
}

impl From<TransferError> for AppError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Authentication(msg) => AppError::Authentication(msg),
            TransferError::Unsupported(msg) => AppError::UnsupportedOperation(msg),
            TransferError::NotFound(msg) => AppError::NotFound(msg),
            TransferError::InvalidRequest(msg) => AppError::InvalidInput(msg),
            TransferError::ConfigError(msg) => AppError::InvalidConfiguration(msg),
            TransferError::UploadFailed {
                message,
                archive_location,
            } => AppError::UploadFailed {
                message,
                archive_location,
            },
            other => AppError::DataTransfer(other.to_string()),
        }
    }
}

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Uniform contract over the archive backends.
///
/// Tokens returned by [`authenticate`](TransferProxy::authenticate) are
/// scoped to one session and must be passed back to the same proxy.
#[async_trait]
pub trait TransferProxy: Send + Sync {
    fn backend_type(&self) -> BackendType;

    /// Exchange service-account credentials for a session token.
    async fn authenticate(&self, account: &IntegratedSystemAccount) -> TransferResult<AuthToken>;

    /// Move a data object into the archive below `base_archive`.
    async fn upload(
        &self,
        _token: &AuthToken,
        _request: &UploadRequest,
        _base_archive: &ArchiveDestination,
        _metadata: &[MetadataEntry],
        _listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> TransferResult<UploadResponse> {
        Err(TransferError::unsupported(self.backend_type(), "upload"))
    }

    /// Move an archived object to the request's destination.
    async fn download(
        &self,
        _token: &AuthToken,
        _request: &DownloadRequest,
        _base_archive: &ArchiveDestination,
        _listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> TransferResult<DownloadResponse> {
        Err(TransferError::unsupported(self.backend_type(), "download"))
    }

    async fn delete(&self, _token: &AuthToken, _location: &FileLocation) -> TransferResult<()> {
        Err(TransferError::unsupported(self.backend_type(), "delete"))
    }

    async fn get_upload_status(
        &self,
        _token: &AuthToken,
        _request_id: &str,
    ) -> TransferResult<UploadStatusReport> {
        Err(TransferError::unsupported(self.backend_type(), "upload status"))
    }

    async fn get_download_status(
        &self,
        _token: &AuthToken,
        _request_id: &str,
    ) -> TransferResult<DownloadStatusReport> {
        Err(TransferError::unsupported(self.backend_type(), "download status"))
    }

    async fn get_transferred_bytes(
        &self,
        _token: &AuthToken,
        _request_id: &str,
    ) -> TransferResult<u64> {
        Err(TransferError::unsupported(self.backend_type(), "transferred bytes"))
    }

    async fn get_path_attributes(
        &self,
        _token: &AuthToken,
        _location: &FileLocation,
        _include_size: bool,
    ) -> TransferResult<PathAttributes> {
        Err(TransferError::unsupported(self.backend_type(), "path attributes"))
    }

    /// Pre-signed URL the archived object can be fetched from.
    async fn generate_download_url(
        &self,
        _token: &AuthToken,
        _location: &FileLocation,
        _expiration: Duration,
    ) -> TransferResult<String> {
        Err(TransferError::unsupported(self.backend_type(), "download URL generation"))
    }

    /// Every file below a directory, recursively.
    async fn scan_directory(
        &self,
        _token: &AuthToken,
        _location: &FileLocation,
    ) -> TransferResult<Vec<DirectoryScanItem>> {
        Err(TransferError::unsupported(self.backend_type(), "directory scan"))
    }

    async fn cancel_transfer(
        &self,
        _token: &AuthToken,
        _request_id: &str,
        _message: &str,
    ) -> TransferResult<()> {
        Err(TransferError::unsupported(self.backend_type(), "transfer cancellation"))
    }

    /// Whether the backend has capacity for another transfer right now.
    async fn accepts_transfer_requests(&self, _token: &AuthToken) -> TransferResult<bool> {
        Ok(true)
    }
}
