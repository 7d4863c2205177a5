use std::path::{Path, PathBuf};
use std::sync::Arc;

use archiva_core::constants::PARTIAL_FILE_SUFFIX;
use archiva_core::models::{BatchOutcomeRecord, DataObjectDescriptor};
use archiva_core::{
    AppError, AppResult, ByteStream, DataManagementService, DownloadHandle, DownloadMode,
    ErrorMetadata, LogLevel,
};

use crate::fs::LocalFileSystem;
use crate::sinks::BatchSinks;

/// Collaborators and settings shared by every task of one batch.
pub struct TaskContext {
    pub service: Arc<dyn DataManagementService>,
    pub fs: Arc<dyn LocalFileSystem>,
    pub sinks: Arc<BatchSinks>,
    pub destination_dir: PathBuf,
    /// Parent of the source collection; object paths are made relative to it.
    pub source_parent: String,
}

pub struct DownloadTask {
    pub descriptor: DataObjectDescriptor,
    pub context: Arc<TaskContext>,
}

/// Entry of a worker queue.
pub enum WorkItem {
    Task(DownloadTask),
    /// No more work for this queue.
    Shutdown,
}

/// Parent of a logical collection path (`/A/b` -> `/A`, `/A` -> `/`).
pub(crate) fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

/// `object_path` relative to `base`, or `None` when it is not below `base`.
pub(crate) fn relativize<'a>(object_path: &'a str, base: &str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    let rest = object_path.strip_prefix(base)?;
    let rest = rest.strip_prefix('/')?;
    (!rest.is_empty()).then_some(rest)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(PARTIAL_FILE_SUFFIX);
    PathBuf::from(name)
}

impl DownloadTask {
    pub fn new(descriptor: DataObjectDescriptor, context: Arc<TaskContext>) -> Self {
        Self {
            descriptor,
            context,
        }
    }

    /// Download the object; failures are recorded in the sinks, never returned.
    pub async fn run(self) -> BatchOutcomeRecord {
        let path = self.descriptor.path.clone();
        let start = std::time::Instant::now();

        match self.download().await {
            Ok(bytes) => {
                tracing::info!(
                    path = %path,
                    size_bytes = bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Data object downloaded"
                );
                BatchOutcomeRecord::success(path)
            }
            Err(e) => {
                let message = format!("Failed to download record due to: {}", e);
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                match e.log_level() {
                    LogLevel::Error => tracing::error!(
                        error = %e,
                        error_code = e.error_code(),
                        path = %path,
                        duration_ms,
                        "Data object download failed"
                    ),
                    LogLevel::Warn => tracing::warn!(
                        error = %e,
                        error_code = e.error_code(),
                        path = %path,
                        duration_ms,
                        "Data object download failed"
                    ),
                    LogLevel::Debug => tracing::debug!(
                        error = %e,
                        error_code = e.error_code(),
                        path = %path,
                        duration_ms,
                        "Data object download failed"
                    ),
                }
                if let Err(sink_error) = self.context.sinks.record_failure(&path, &e).await {
                    tracing::error!(
                        error = %sink_error,
                        path = %path,
                        "Failed to record download failure"
                    );
                }
                BatchOutcomeRecord::failure(path, message)
            }
        }
    }

    /// Local file the object is written to.
    pub fn destination(&self) -> AppResult<PathBuf> {
        let relative = relativize(&self.descriptor.path, &self.context.source_parent)
            .ok_or_else(|| {
                AppError::record_processing(
                    &self.descriptor.path,
                    format!("not below {}", self.context.source_parent),
                )
            })?;
        Ok(self.context.destination_dir.join(relative))
    }

    async fn download(&self) -> AppResult<u64> {
        let ctx = &self.context;
        let destination = self.destination()?;
        let partial = partial_path(&destination);

        if let Some(parent) = destination.parent() {
            if !ctx.fs.exists(parent).await? {
                ctx.fs.create_dir_all(parent).await?;
            }
        }
        ctx.fs.remove_if_exists(&partial).await.map_err(|e| {
            AppError::record_processing(
                &self.descriptor.path,
                format!("previous partial file cannot be deleted: {}", e),
            )
        })?;

        let stream = self.open_source().await?;
        let written = ctx.fs.write_stream(&partial, stream).await?;
        ctx.fs.rename(&partial, &destination).await?;

        Ok(written)
    }

    /// Byte stream of the object: a redirect URL when the service offers
    /// one, otherwise the service streams the bytes itself.
    async fn open_source(&self) -> AppResult<ByteStream> {
        let service = &self.context.service;
        let path = &self.descriptor.path;

        let handle = match service.initiate_download(path, DownloadMode::RedirectUrl).await {
            Ok(handle) => handle,
            Err(AppError::InvalidInput(reason)) => {
                tracing::debug!(path = %path, reason = %reason, "Redirect refused, streaming");
                service.initiate_download(path, DownloadMode::Stream).await?
            }
            Err(e) => return Err(e),
        };

        match handle {
            DownloadHandle::RedirectUrl(url) => service.open_url(&url).await,
            DownloadHandle::Stream(stream) => Ok(stream),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/Tenant/project"), "/Tenant");
        assert_eq!(parent_path("/Tenant/project/"), "/Tenant");
        assert_eq!(parent_path("/Tenant"), "/");
    }

    #[test]
    fn test_relativize_against_parent() {
        assert_eq!(
            relativize("/Tenant/project/sub/a.dat", "/Tenant"),
            Some("project/sub/a.dat")
        );
        assert_eq!(relativize("/Tenant/a.dat", "/"), Some("Tenant/a.dat"));
        assert_eq!(relativize("/TenantX/a.dat", "/Tenant"), None);
        assert_eq!(relativize("/Tenant", "/Tenant"), None);
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/data/out/a.dat")),
            PathBuf::from("/data/out/a.dat_filepart")
        );
    }
}
