//! Error types module
//!
//! All failures that cross a component boundary are expressed as [`AppError`].
//! Backend crates keep their own narrower error enums and convert into it.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

use crate::models::FileLocation;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a rejected record
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Self-description of an error for callers that report or retry it
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "DATA_TRANSFER_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Operation not supported: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data transfer error: {0}")]
    DataTransfer(String),

    /// A failed upload, with the archive destination it was written to.
    #[error("Upload failed: {message}")]
    UploadFailed {
        message: String,
        archive_location: Option<FileLocation>,
    },

    #[error("Failed to process record {path}: {message}")]
    RecordProcessing { path: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn app_error_static_metadata(err: &AppError) -> (&'static str, bool, LogLevel) {
    match err {
        AppError::Database(_) => ("DATABASE_ERROR", true, LogLevel::Error),
        AppError::Authentication(_) => ("AUTHENTICATION_ERROR", false, LogLevel::Warn),
        AppError::UnsupportedOperation(_) => ("UNSUPPORTED_OPERATION", false, LogLevel::Debug),
        AppError::InvalidConfiguration(_) => ("INVALID_CONFIGURATION", false, LogLevel::Error),
        AppError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        AppError::DataTransfer(_) => ("DATA_TRANSFER_ERROR", true, LogLevel::Error),
        AppError::UploadFailed { .. } => ("UPLOAD_FAILED", true, LogLevel::Error),
        AppError::RecordProcessing { .. } => ("RECORD_PROCESSING_ERROR", true, LogLevel::Warn),
        AppError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            ("INTERNAL_ERROR", true, LogLevel::Error)
        }
    }
}

impl AppError {
    pub fn record_processing(path: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::RecordProcessing {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Archive destination of a failed upload, for cleanup of partial artifacts.
    pub fn archive_location(&self) -> Option<&FileLocation> {
        match self {
            AppError::UploadFailed {
                archive_location, ..
            } => archive_location.as_ref(),
            _ => None,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access configuration store".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal error".to_string()
            }
            AppError::RecordProcessing { path, .. } => format!("Failed to process {}", path),
            AppError::UploadFailed { message, .. } => message.clone(),
            AppError::Authentication(ref msg)
            | AppError::UnsupportedOperation(ref msg)
            | AppError::InvalidConfiguration(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::DataTransfer(ref msg)
            | AppError::InvalidInput(ref msg) => msg.clone(),
        }
    }
}
