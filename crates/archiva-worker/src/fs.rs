//! Local filesystem access used by batch downloads.

use std::path::Path;

use archiva_core::{AppError, AppResult, ByteStream};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

#[async_trait]
pub trait LocalFileSystem: Send + Sync {
    async fn create_dir_all(&self, path: &Path) -> AppResult<()>;

    /// Delete a file; a missing file is not an error.
    async fn remove_if_exists(&self, path: &Path) -> AppResult<()>;

    /// Move `from` over `to`, replacing any existing file.
    async fn rename(&self, from: &Path, to: &Path) -> AppResult<()>;

    async fn exists(&self, path: &Path) -> AppResult<bool>;

    /// Write every chunk of `stream` into a new file at `path`; returns the byte count.
    async fn write_stream(&self, path: &Path, stream: ByteStream) -> AppResult<u64>;
}

/// `LocalFileSystem` over `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

fn io_error(operation: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Internal(format!("{} {} failed: {}", operation, path.display(), err))
}

#[async_trait]
impl LocalFileSystem for TokioFileSystem {
    async fn create_dir_all(&self, path: &Path) -> AppResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| io_error("Creating directory", path, e))
    }

    async fn remove_if_exists(&self, path: &Path) -> AppResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("Removing", path, e)),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> AppResult<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| io_error("Renaming", from, e))
    }

    async fn exists(&self, path: &Path) -> AppResult<bool> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| io_error("Checking", path, e))
    }

    async fn write_stream(&self, path: &Path, mut stream: ByteStream) -> AppResult<u64> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| io_error("Creating", path, e))?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| io_error("Writing", path, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| io_error("Flushing", path, e))?;

        Ok(written)
    }
}
