//! Failure sinks of a batch: the failed-records file (one path per line) and
//! a JSON-lines diagnostic log.

use std::path::Path;

use archiva_core::{AppError, AppResult, ErrorMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One line of the diagnostic error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub error_code: String,
    pub recoverable: bool,
    /// Error text followed by its cause chain.
    pub message: String,
}

pub struct BatchSinks {
    failed_records: Mutex<File>,
    error_log: Mutex<File>,
}

async fn open_append(path: &Path) -> AppResult<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| AppError::Internal(format!("Opening {} failed: {}", path.display(), e)))
}

impl BatchSinks {
    /// Open both files for appending, creating them and their directories.
    pub async fn open(failed_records: &Path, error_log: &Path) -> AppResult<Self> {
        Ok(Self {
            failed_records: Mutex::new(open_append(failed_records).await?),
            error_log: Mutex::new(open_append(error_log).await?),
        })
    }

    /// Append `path` to the failed records and a diagnostic line to the error log.
    pub async fn record_failure(&self, path: &str, error: &AppError) -> AppResult<()> {
        {
            let mut file = self.failed_records.lock().await;
            file.write_all(format!("{}\n", path).as_bytes()).await?;
            file.flush().await?;
        }

        let entry = ErrorLogEntry {
            timestamp: Utc::now(),
            path: path.to_string(),
            error_code: error.error_code().to_string(),
            recoverable: error.is_recoverable(),
            message: format!("Failed to download record due to: {}", error.detailed_message()),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = self.error_log.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_failure_appends_to_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let failed = dir.path().join("logs/failed.txt");
        let errors = dir.path().join("logs/errors.jsonl");

        let sinks = BatchSinks::open(&failed, &errors).await.unwrap();
        sinks
            .record_failure("/T/a.dat", &AppError::DataTransfer("timeout".to_string()))
            .await
            .unwrap();
        sinks
            .record_failure("/T/b.dat", &AppError::NotFound("gone".to_string()))
            .await
            .unwrap();

        let failed = tokio::fs::read_to_string(&failed).await.unwrap();
        assert_eq!(failed, "/T/a.dat\n/T/b.dat\n");

        let errors = tokio::fs::read_to_string(&errors).await.unwrap();
        let entries: Vec<ErrorLogEntry> = errors
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].error_code, "DATA_TRANSFER_ERROR");
        assert!(entries[0].recoverable);
        assert_eq!(entries[1].path, "/T/b.dat");
        assert_eq!(entries[1].error_code, "NOT_FOUND");
        assert!(!entries[1].recoverable);
        assert_eq!(
            entries[1].message,
            "Failed to download record due to: Not found: gone"
        );
    }
}
