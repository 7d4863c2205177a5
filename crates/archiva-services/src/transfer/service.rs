use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use archiva_core::models::{
    ArchiveDestination, DownloadRequest, DownloadResponse, DownloadStatusReport,
    FileLocation, IntegratedSystemAccount, MetadataEntry, PathAttributes, UploadRequest,
    UploadResponse, UploadStatusReport,
};
use archiva_core::{AppError, AppResult, BackendType, UploadProgressCalculator};
use archiva_transfer::{AuthToken, TransferProgressListener, TransferProxy, TransferProxyRegistry};

use crate::configuration::ConfigurationLocator;

/// Service-account credentials per backend.
pub type BackendAccounts = HashMap<BackendType, IntegratedSystemAccount>;

/// Routes data-object transfers to the backend configured for their tenant.
pub struct DataTransferService {
    locator: Arc<ConfigurationLocator>,
    registry: TransferProxyRegistry,
    accounts: BackendAccounts,
    calculator: UploadProgressCalculator,
    url_expiration: Duration,
}

impl DataTransferService {
    pub fn new(
        locator: Arc<ConfigurationLocator>,
        registry: TransferProxyRegistry,
        accounts: BackendAccounts,
        url_expiration: Duration,
    ) -> Self {
        Self {
            locator,
            registry,
            accounts,
            calculator: UploadProgressCalculator::new(),
            url_expiration,
        }
    }

    /// Proxy for `backend` and a fresh session token.
    async fn session(&self, backend: BackendType) -> AppResult<(Arc<dyn TransferProxy>, AuthToken)> {
        let proxy = self.registry.get(backend)?;
        let account = self.accounts.get(&backend).ok_or_else(|| {
            AppError::InvalidConfiguration(format!("No account configured for {} backend", backend))
        })?;
        let token = proxy.authenticate(account).await.map_err(|e| {
            tracing::warn!(error = %e, backend = %backend, "Backend authentication failed");
            AppError::from(e)
        })?;
        Ok((proxy, token))
    }

    /// Archive backend and base destination of the tenant owning `path`.
    async fn archive_target(&self, path: &str) -> AppResult<(BackendType, ArchiveDestination)> {
        let config_id = self.locator.get_config_id(path).await?;
        self.archive_target_for_config(&config_id).await
    }

    async fn archive_target_for_config(
        &self,
        config_id: &str,
    ) -> AppResult<(BackendType, ArchiveDestination)> {
        let backend = self.locator.get_archive_backend_type(config_id).await?;
        let archive_config = self.locator.get_archive_config(config_id, backend).await?;
        let destination = archive_config.destination().ok_or_else(|| {
            AppError::InvalidConfiguration(format!(
                "Archive configuration {} has no recognized archive type",
                archive_config.id
            ))
        })?;
        Ok((backend, destination))
    }

    /// Archive a data object on its tenant's archive backend.
    #[tracing::instrument(skip(self, metadata, listener), fields(path = %request.path))]
    pub async fn upload_data_object(
        &self,
        request: &UploadRequest,
        metadata: &[MetadataEntry],
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> AppResult<UploadResponse> {
        let (backend, base_archive) = self.archive_target(&request.path).await?;
        let (proxy, token) = self.session(backend).await?;

        let start = std::time::Instant::now();
        match proxy
            .upload(&token, request, &base_archive, metadata, listener)
            .await
        {
            Ok(response) => {
                tracing::info!(
                    backend = %backend,
                    archive_location = %response.archive_location,
                    status = %response.status,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Data object upload accepted"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    backend = %backend,
                    base_archive = %base_archive.file_location,
                    archive_location = ?e.archive_location().map(ToString::to_string),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Data object upload failed"
                );
                Err(e.into())
            }
        }
    }

    /// Download an archived object of configuration `config_id` through `backend`.
    ///
    /// When `backend` is not the archive backend itself (a cloud drive), the
    /// archive proxy first signs a download URL the drive can pull from.
    #[tracing::instrument(skip(self, request, listener), fields(path = %request.path))]
    pub async fn download_data_object(
        &self,
        config_id: &str,
        backend: BackendType,
        request: &DownloadRequest,
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> AppResult<DownloadResponse> {
        let (archive_backend, base_archive) = self.archive_target_for_config(config_id).await?;

        let mut request = request.clone();
        if backend != archive_backend && request.source_url.is_none() {
            let (archive_proxy, archive_token) = self.session(archive_backend).await?;
            let url = archive_proxy
                .generate_download_url(&archive_token, &request.archive_location, self.url_expiration)
                .await?;
            request.source_url = Some(url);
        }

        let (proxy, token) = self.session(backend).await?;
        let response = proxy
            .download(&token, &request, &base_archive, listener)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    backend = %backend,
                    archive_location = %request.archive_location,
                    "Data object download failed"
                );
                AppError::from(e)
            })?;

        tracing::info!(
            backend = %backend,
            archive_backend = %archive_backend,
            request_id = %response.request_id,
            "Data object download started"
        );
        Ok(response)
    }

    pub async fn get_upload_status(&self, path: &str, request_id: &str) -> AppResult<UploadStatusReport> {
        let (backend, _) = self.archive_target(path).await?;
        let (proxy, token) = self.session(backend).await?;
        Ok(proxy.get_upload_status(&token, request_id).await?)
    }

    pub async fn get_download_status(
        &self,
        backend: BackendType,
        request_id: &str,
    ) -> AppResult<DownloadStatusReport> {
        let (proxy, token) = self.session(backend).await?;
        Ok(proxy.get_download_status(&token, request_id).await?)
    }

    /// Percent complete of an upload; `None` when not meaningful.
    pub async fn upload_percent_complete(
        &self,
        path: &str,
        request_id: &str,
        total_size: Option<u64>,
    ) -> AppResult<Option<u8>> {
        let (backend, _) = self.archive_target(path).await?;
        let (proxy, token) = self.session(backend).await?;
        let report = proxy.get_upload_status(&token, request_id).await?;

        Ok(self.calculator.percent_complete(
            Some(report.status),
            Some(backend),
            Some(report.bytes_transferred),
            total_size,
        ))
    }

    #[tracing::instrument(skip(self), fields(location = %location))]
    pub async fn delete_data_object(&self, path: &str, location: &FileLocation) -> AppResult<()> {
        let (backend, _) = self.archive_target(path).await?;
        let (proxy, token) = self.session(backend).await?;
        proxy.delete(&token, location).await?;
        tracing::info!(backend = %backend, "Archived data object deleted");
        Ok(())
    }

    pub async fn get_path_attributes(
        &self,
        path: &str,
        location: &FileLocation,
        include_size: bool,
    ) -> AppResult<PathAttributes> {
        let (backend, _) = self.archive_target(path).await?;
        let (proxy, token) = self.session(backend).await?;
        Ok(proxy
            .get_path_attributes(&token, location, include_size)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiva_core::models::{
        ArchiveConfig, ArchiveType, DownloadDestination, TenantConfig, UploadSource, UploadStatus,
    };
    use archiva_core::{resolve_archive_destination, ErrorMetadata, TenantConfigStore};
    use archiva_transfer::{TransferError, TransferResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticStore(Vec<TenantConfig>);

    #[async_trait]
    impl TenantConfigStore for StaticStore {
        async fn list_tenant_configs(&self) -> AppResult<Vec<TenantConfig>> {
            Ok(self.0.clone())
        }
    }

    /// Object-storage stand-in that archives deterministically and reports a
    /// streaming upload.
    #[derive(Default)]
    struct FakeArchive {
        uploads: Mutex<Vec<String>>,
        fail_uploads: bool,
    }

    #[async_trait]
    impl TransferProxy for FakeArchive {
        fn backend_type(&self) -> BackendType {
            BackendType::ObjectStorage
        }

        async fn authenticate(&self, account: &IntegratedSystemAccount) -> TransferResult<AuthToken> {
            if account.password.is_empty() {
                return Err(TransferError::Authentication("empty secret".to_string()));
            }
            Ok(AuthToken::from_bearer(BackendType::ObjectStorage, "s3"))
        }

        async fn upload(
            &self,
            _token: &AuthToken,
            request: &UploadRequest,
            base_archive: &ArchiveDestination,
            _metadata: &[MetadataEntry],
            _listener: Option<Arc<dyn TransferProgressListener>>,
        ) -> TransferResult<UploadResponse> {
            let location = resolve_archive_destination(
                &base_archive.file_location,
                &request.path,
                request.caller_namespace.as_deref(),
                base_archive.archive_type,
                request.unique,
            );
            if self.fail_uploads {
                return Err(TransferError::upload_failed("bucket unavailable")
                    .with_archive_location(location));
            }
            self.uploads.lock().unwrap().push(location.file_id.clone());
            Ok(UploadResponse {
                archive_location: location,
                request_id: "req-1".to_string(),
                status: UploadStatus::Archived,
                upload_url: None,
                source_size: request.size,
            })
        }

        async fn get_upload_status(
            &self,
            _token: &AuthToken,
            _request_id: &str,
        ) -> TransferResult<UploadStatusReport> {
            Ok(UploadStatusReport {
                status: UploadStatus::StreamingInProgress,
                bytes_transferred: 2000,
                message: None,
            })
        }

        async fn generate_download_url(
            &self,
            _token: &AuthToken,
            location: &FileLocation,
            _expiration: Duration,
        ) -> TransferResult<String> {
            Ok(format!("https://signed.example/{}", location.file_id))
        }
    }

    /// Drive stand-in that records the source URL it was given.
    #[derive(Default)]
    struct FakeDrive {
        source_urls: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl TransferProxy for FakeDrive {
        fn backend_type(&self) -> BackendType {
            BackendType::GoogleDrive
        }

        async fn authenticate(&self, _account: &IntegratedSystemAccount) -> TransferResult<AuthToken> {
            Ok(AuthToken::from_bearer(BackendType::GoogleDrive, "drive"))
        }

        async fn download(
            &self,
            _token: &AuthToken,
            request: &DownloadRequest,
            _base_archive: &ArchiveDestination,
            _listener: Option<Arc<dyn TransferProgressListener>>,
        ) -> TransferResult<DownloadResponse> {
            self.source_urls
                .lock()
                .unwrap()
                .push(request.source_url.clone());
            Ok(DownloadResponse {
                request_id: "drive-1".to_string(),
            })
        }
    }

    fn tenant() -> TenantConfig {
        let archive = ArchiveConfig {
            id: "ccr-s3".to_string(),
            backend_type: BackendType::ObjectStorage,
            base_archive_destination: FileLocation::new("archive-bucket", "/dme/archive/"),
            archive_type: Some(ArchiveType::Archive),
            local_directory: None,
        };
        TenantConfig {
            id: "ccr".to_string(),
            tenant_code: "CCR".to_string(),
            base_path: "/CCR_Tenant".to_string(),
            archive_configs: HashMap::from([(BackendType::ObjectStorage, archive)]),
            upload_config_id: Some("ccr-s3".to_string()),
            default_download_config_id: None,
        }
    }

    async fn service(archive: Arc<FakeArchive>, drive: Arc<FakeDrive>) -> DataTransferService {
        let locator = Arc::new(ConfigurationLocator::new(Arc::new(StaticStore(vec![tenant()]))));
        locator.reload().await.unwrap();

        let mut registry = TransferProxyRegistry::new();
        registry.register(archive);
        registry.register(drive);

        let accounts = HashMap::from([
            (BackendType::ObjectStorage, IntegratedSystemAccount::new("key", "secret")),
            (BackendType::GoogleDrive, IntegratedSystemAccount::new("user", "token")),
        ]);
        DataTransferService::new(locator, registry, accounts, Duration::from_secs(3600))
    }

    fn upload_request() -> UploadRequest {
        UploadRequest {
            path: "/CCR_Tenant/project/run1.fastq".to_string(),
            caller_namespace: Some("user-17".to_string()),
            source: UploadSource::File("/tmp/run1.fastq".into()),
            size: Some(5000),
            unique: false,
        }
    }

    #[tokio::test]
    async fn test_upload_routes_to_tenant_archive() {
        let archive = Arc::new(FakeArchive::default());
        let svc = service(archive.clone(), Arc::new(FakeDrive::default())).await;

        let response = svc
            .upload_data_object(&upload_request(), &[], None)
            .await
            .unwrap();

        assert_eq!(response.archive_location.container_id, "archive-bucket");
        assert_eq!(
            archive.uploads.lock().unwrap().as_slice(),
            ["/dme/archive/user-17/CCR_Tenant/project/run1.fastq"]
        );
    }

    #[tokio::test]
    async fn test_upload_outside_any_tenant_is_not_found() {
        let svc = service(Arc::new(FakeArchive::default()), Arc::new(FakeDrive::default())).await;
        let mut request = upload_request();
        request.path = "/Elsewhere/run1.fastq".to_string();

        assert!(matches!(
            svc.upload_data_object(&request, &[], None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_upload_returns_archive_location() {
        let archive = Arc::new(FakeArchive {
            fail_uploads: true,
            ..FakeArchive::default()
        });
        let svc = service(archive, Arc::new(FakeDrive::default())).await;

        let err = svc
            .upload_data_object(&upload_request(), &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UploadFailed { .. }));
        assert_eq!(err.error_code(), "UPLOAD_FAILED");
        let location = err.archive_location().expect("failed upload keeps its location");
        assert_eq!(location.container_id, "archive-bucket");
        assert_eq!(
            location.file_id,
            "/dme/archive/user-17/CCR_Tenant/project/run1.fastq"
        );
    }

    #[tokio::test]
    async fn test_percent_complete_from_streaming_status() {
        let svc = service(Arc::new(FakeArchive::default()), Arc::new(FakeDrive::default())).await;

        let percent = svc
            .upload_percent_complete("/CCR_Tenant/project/run1.fastq", "req-1", Some(5000))
            .await
            .unwrap();
        assert_eq!(percent, Some(40));
    }

    #[tokio::test]
    async fn test_drive_download_gets_signed_source_url() {
        let drive = Arc::new(FakeDrive::default());
        let svc = service(Arc::new(FakeArchive::default()), drive.clone()).await;
        let request = DownloadRequest {
            path: "/CCR_Tenant/project/run1.fastq".to_string(),
            archive_location: FileLocation::new("archive-bucket", "dme/archive/run1.fastq"),
            source_url: None,
            destination: DownloadDestination::Drive {
                folder_id: None,
                file_name: "run1.fastq".to_string(),
            },
            size: Some(5000),
        };

        let response = svc
            .download_data_object("ccr", BackendType::GoogleDrive, &request, None)
            .await
            .unwrap();

        assert_eq!(response.request_id, "drive-1");
        assert_eq!(
            drive.source_urls.lock().unwrap().as_slice(),
            [Some("https://signed.example/dme/archive/run1.fastq".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_account_is_configuration_error() {
        let svc = service(Arc::new(FakeArchive::default()), Arc::new(FakeDrive::default())).await;
        assert!(matches!(
            svc.get_download_status(BackendType::Box, "x").await,
            Err(AppError::NotFound(_)) | Err(AppError::InvalidConfiguration(_))
        ));
    }
}
