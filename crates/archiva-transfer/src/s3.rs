use std::sync::Arc;
use std::time::Duration;

use archiva_core::models::{
    ArchiveDestination, DirectoryScanItem, DownloadDestination, DownloadRequest,
    DownloadResponse, DownloadStatusReport, FileLocation, IntegratedSystemAccount, MetadataEntry,
    PathAttributes, UploadRequest, UploadResponse, UploadSource, UploadStatus, UploadStatusReport,
};
use archiva_core::{resolve_archive_destination, BackendType, TransferSettings};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutMultipartOptions, WriteMultipart,
};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::http_util::{build_streaming_client, check_status, request_failed, spawn_tracked};
use crate::progress::{ProgressReporter, TransferProgressListener};
use crate::token::{AuthToken, ObjectStorageCredential};
use crate::tracker::{TrackedState, TransferDirection, TransferTracker};
use crate::traits::{TransferError, TransferProxy, TransferResult};

/// Read size of the local file feeding a multipart upload.
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// Parts in flight per multipart upload.
const MAX_CONCURRENT_PARTS: usize = 4;

/// S3-compatible object storage proxy.
///
/// File uploads and downloads return once the object store confirmed them.
/// Uploads from a source URL run in the background and report through the
/// listener. The tracker records every request so status queries work for
/// concurrent callers too. Accounts carry the access key as `username`, the
/// secret as `password`, and optional `region` and `endpoint` properties for
/// S3-compatible providers.
#[derive(Clone)]
pub struct ObjectStorageProxy {
    http: Client,
    default_region: String,
    reporting_rate: u64,
    tracker: TransferTracker,
}

impl ObjectStorageProxy {
    pub fn new(settings: &TransferSettings, tracker: TransferTracker) -> TransferResult<Self> {
        Ok(Self {
            http: build_streaming_client(settings.http_timeout_secs)?,
            default_region: settings.s3_default_region.clone(),
            reporting_rate: settings.progress_reporting_rate_bytes,
            tracker,
        })
    }

    fn store(&self, token: &AuthToken, bucket: &str) -> TransferResult<AmazonS3> {
        let credential = token.object_storage_credential()?;
        build_store(credential, bucket)
    }

    async fn upload_file(
        &self,
        store: &AmazonS3,
        source: &std::path::Path,
        destination: &FileLocation,
        attributes: Attributes,
        reporter: &ProgressReporter,
    ) -> TransferResult<u64> {
        let file = tokio::fs::File::open(source).await?;
        let chunks =
            ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE).map_err(TransferError::from);
        put_stream(store, destination, attributes, chunks, reporter).await
    }

    async fn download_to_file(
        &self,
        store: &AmazonS3,
        source: &FileLocation,
        destination: &std::path::Path,
        reporter: &ProgressReporter,
    ) -> TransferResult<u64> {
        let location = Path::from(source.file_id.as_str());
        let result = store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => TransferError::NotFound(source.to_string()),
            other => TransferError::DownloadFailed(other.to_string()),
        })?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk).await?;
            reporter.advance(chunk.len() as u64);
        }
        file.flush().await?;

        Ok(reporter.transferred())
    }
}

fn build_store(credential: &ObjectStorageCredential, bucket: &str) -> TransferResult<AmazonS3> {
    let mut builder = AmazonS3Builder::new()
        .with_access_key_id(credential.access_key_id.clone())
        .with_secret_access_key(credential.secret_access_key.clone())
        .with_region(credential.region.clone())
        .with_bucket_name(bucket);

    if let Some(ref endpoint) = credential.endpoint {
        let allow_http = endpoint.starts_with("http://");
        builder = builder
            .with_endpoint(endpoint.clone())
            .with_allow_http(allow_http);
    }

    builder
        .build()
        .map_err(|e| TransferError::ConfigError(e.to_string()))
}

fn metadata_attributes(metadata: &[MetadataEntry]) -> Attributes {
    let mut attributes = Attributes::new();
    for entry in metadata {
        attributes.insert(
            Attribute::Metadata(entry.attribute.clone().into()),
            entry.value.clone().into(),
        );
    }
    attributes
}

/// Multipart-upload `chunks` to `destination`, advancing `reporter` per chunk.
async fn put_stream<S>(
    store: &AmazonS3,
    destination: &FileLocation,
    attributes: Attributes,
    chunks: S,
    reporter: &ProgressReporter,
) -> TransferResult<u64>
where
    S: Stream<Item = TransferResult<Bytes>> + Send,
{
    let location = Path::from(destination.file_id.as_str());
    let opts = PutMultipartOptions {
        attributes,
        ..Default::default()
    };

    let upload = store
        .put_multipart_opts(&location, opts)
        .await
        .map_err(|e| TransferError::upload_failed(e.to_string()))?;
    let mut writer = WriteMultipart::new(upload);
    let mut chunks = std::pin::pin!(chunks);

    while let Some(chunk) = chunks.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                abort_quietly(writer, destination).await;
                return Err(e);
            }
        };
        if let Err(e) = writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await {
            abort_quietly(writer, destination).await;
            return Err(TransferError::upload_failed(e.to_string()));
        }
        writer.write(&chunk);
        reporter.advance(chunk.len() as u64);
    }

    writer
        .finish()
        .await
        .map_err(|e| TransferError::upload_failed(e.to_string()))?;

    Ok(reporter.transferred())
}

/// Background body of an upload from a source URL.
async fn stream_url_into_store(
    client: Client,
    source_url: String,
    store: AmazonS3,
    destination: FileLocation,
    attributes: Attributes,
    reporter: Arc<ProgressReporter>,
) -> TransferResult<()> {
    let response = client
        .get(&source_url)
        .send()
        .await
        .map_err(|e| request_failed("Upload source read", e))?;
    let response = check_status(response, "Upload source read").await?;
    let chunks = response
        .bytes_stream()
        .map_err(|e| TransferError::upload_failed(format!("Upload source interrupted: {}", e)));

    put_stream(&store, &destination, attributes, chunks, &reporter).await?;
    Ok(())
}

async fn abort_quietly(writer: WriteMultipart, destination: &FileLocation) {
    if let Err(e) = writer.abort().await {
        tracing::warn!(error = %e, archive_location = %destination, "Failed to abort multipart upload");
    }
}

fn map_head_error(err: ObjectStoreError, location: &FileLocation) -> TransferError {
    match err {
        ObjectStoreError::NotFound { .. } => TransferError::NotFound(location.to_string()),
        ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
            TransferError::Authentication(format!("access denied to {}", location))
        }
        other => TransferError::BackendError(other.to_string()),
    }
}

#[async_trait]
impl TransferProxy for ObjectStorageProxy {
    fn backend_type(&self) -> BackendType {
        BackendType::ObjectStorage
    }

    async fn authenticate(&self, account: &IntegratedSystemAccount) -> TransferResult<AuthToken> {
        if account.username.is_empty() || account.password.is_empty() {
            return Err(TransferError::Authentication(
                "object storage account needs an access key and a secret".to_string(),
            ));
        }

        Ok(AuthToken::object_storage(ObjectStorageCredential {
            access_key_id: account.username.clone(),
            secret_access_key: account.password.clone(),
            region: account
                .property("region")
                .unwrap_or(&self.default_region)
                .to_string(),
            endpoint: account.property("endpoint").map(String::from),
        }))
    }

    async fn upload(
        &self,
        token: &AuthToken,
        request: &UploadRequest,
        base_archive: &ArchiveDestination,
        metadata: &[MetadataEntry],
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> TransferResult<UploadResponse> {
        let destination = resolve_archive_destination(
            &base_archive.file_location,
            &request.path,
            request.caller_namespace.as_deref(),
            base_archive.archive_type,
            request.unique,
        );
        let store = self.store(token, &destination.container_id)?;
        let request_id = Uuid::new_v4().to_string();
        let start = std::time::Instant::now();

        match &request.source {
            UploadSource::GenerateUploadUrl { expiration } => {
                let url = store
                    .signed_url(Method::PUT, &Path::from(destination.file_id.as_str()), *expiration)
                    .await
                    .map_err(|e| {
                        TransferError::BackendError(e.to_string())
                            .with_archive_location(destination.clone())
                    })?;
                self.tracker
                    .register_external_upload(&request_id, base_archive.archive_type, destination.clone())
                    .await;

                tracing::info!(
                    archive_location = %destination,
                    request_id = %request_id,
                    "Generated object storage upload URL"
                );

                Ok(UploadResponse {
                    archive_location: destination,
                    request_id,
                    status: UploadStatus::UrlGenerated,
                    upload_url: Some(url.to_string()),
                    source_size: request.size,
                })
            }
            UploadSource::File(path) => {
                let counter = self
                    .tracker
                    .register(
                        &request_id,
                        TransferDirection::Upload(base_archive.archive_type),
                        request.size,
                        Some(destination.clone()),
                    )
                    .await;
                let reporter =
                    ProgressReporter::with_counter(listener, self.reporting_rate, counter);

                match self
                    .upload_file(&store, path, &destination, metadata_attributes(metadata), &reporter)
                    .await
                {
                    Ok(size) => {
                        self.tracker.complete(&request_id, Some(size)).await;
                        reporter.complete();
                        tracing::info!(
                            archive_location = %destination,
                            request_id = %request_id,
                            size_bytes = size,
                            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                            "Object storage upload successful"
                        );
                        Ok(UploadResponse {
                            archive_location: destination,
                            request_id,
                            status: UploadStatus::arrived_in(base_archive.archive_type),
                            upload_url: None,
                            source_size: Some(size),
                        })
                    }
                    Err(e) => {
                        let message = e.to_string();
                        self.tracker.fail(&request_id, &message).await;
                        reporter.fail(&message);
                        tracing::error!(
                            error = %e,
                            archive_location = %destination,
                            request_id = %request_id,
                            bytes_transferred = reporter.transferred(),
                            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                            "Object storage upload failed"
                        );
                        Err(e.with_archive_location(destination))
                    }
                }
            }
            UploadSource::Url(source_url) => {
                let Some(listener) = listener else {
                    return Err(TransferError::InvalidRequest(
                        "uploads from a source URL need a progress listener".to_string(),
                    ));
                };

                let counter = self
                    .tracker
                    .register(
                        &request_id,
                        TransferDirection::Upload(base_archive.archive_type),
                        request.size,
                        Some(destination.clone()),
                    )
                    .await;
                let reporter = Arc::new(ProgressReporter::with_counter(
                    Some(listener),
                    self.reporting_rate,
                    counter,
                ));

                spawn_tracked(
                    BackendType::ObjectStorage,
                    self.tracker.clone(),
                    request_id.clone(),
                    reporter.clone(),
                    stream_url_into_store(
                        self.http.clone(),
                        source_url.clone(),
                        store,
                        destination.clone(),
                        metadata_attributes(metadata),
                        reporter,
                    ),
                );

                tracing::info!(
                    archive_location = %destination,
                    request_id = %request_id,
                    "Object storage streaming upload started"
                );

                Ok(UploadResponse {
                    archive_location: destination,
                    request_id,
                    status: UploadStatus::StreamingInProgress,
                    upload_url: None,
                    source_size: request.size,
                })
            }
            UploadSource::Location(_) => Err(TransferError::InvalidRequest(
                "object storage uploads take a local file, a source URL or a generated upload URL"
                    .to_string(),
            )),
        }
    }

    async fn download(
        &self,
        token: &AuthToken,
        request: &DownloadRequest,
        _base_archive: &ArchiveDestination,
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> TransferResult<DownloadResponse> {
        let DownloadDestination::File(ref destination) = request.destination else {
            return Err(TransferError::InvalidRequest(
                "object storage downloads need a local file destination".to_string(),
            ));
        };

        let store = self.store(token, &request.archive_location.container_id)?;
        let request_id = Uuid::new_v4().to_string();
        let counter = self
            .tracker
            .register(
                &request_id,
                TransferDirection::Download,
                request.size,
                Some(request.archive_location.clone()),
            )
            .await;
        let reporter = ProgressReporter::with_counter(listener, self.reporting_rate, counter);
        let start = std::time::Instant::now();

        match self
            .download_to_file(&store, &request.archive_location, destination, &reporter)
            .await
        {
            Ok(size) => {
                self.tracker.complete(&request_id, Some(size)).await;
                reporter.complete();
                tracing::info!(
                    archive_location = %request.archive_location,
                    request_id = %request_id,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage download successful"
                );
                Ok(DownloadResponse { request_id })
            }
            Err(e) => {
                let message = e.to_string();
                self.tracker.fail(&request_id, &message).await;
                reporter.fail(&message);
                tracing::error!(
                    error = %e,
                    archive_location = %request.archive_location,
                    request_id = %request_id,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage download failed"
                );
                Err(e)
            }
        }
    }

    async fn delete(&self, token: &AuthToken, location: &FileLocation) -> TransferResult<()> {
        let store = self.store(token, &location.container_id)?;
        let start = std::time::Instant::now();

        store
            .delete(&Path::from(location.file_id.as_str()))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    archive_location = %location,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage delete failed"
                );
                TransferError::DeleteFailed(e.to_string())
            })?;

        tracing::info!(
            archive_location = %location,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage delete successful"
        );
        Ok(())
    }

    async fn get_upload_status(
        &self,
        token: &AuthToken,
        request_id: &str,
    ) -> TransferResult<UploadStatusReport> {
        let snapshot = self.tracker.require(request_id).await?;

        // Bytes sent to a pre-signed URL are only visible in the store itself.
        if snapshot.state == TrackedState::AwaitingExternalUpload {
            if let Some(ref location) = snapshot.location {
                let attributes = self.get_path_attributes(token, location, true).await?;
                if attributes.is_file {
                    self.tracker.complete(request_id, attributes.size).await;
                    return Ok(self.tracker.require(request_id).await?.upload_report());
                }
            }
        }

        Ok(snapshot.upload_report())
    }

    async fn get_download_status(
        &self,
        _token: &AuthToken,
        request_id: &str,
    ) -> TransferResult<DownloadStatusReport> {
        Ok(self.tracker.require(request_id).await?.download_report())
    }

    async fn get_transferred_bytes(
        &self,
        _token: &AuthToken,
        request_id: &str,
    ) -> TransferResult<u64> {
        Ok(self.tracker.require(request_id).await?.bytes_transferred)
    }

    async fn get_path_attributes(
        &self,
        token: &AuthToken,
        location: &FileLocation,
        include_size: bool,
    ) -> TransferResult<PathAttributes> {
        let store = self.store(token, &location.container_id)?;
        let path = Path::from(location.file_id.as_str());

        match store.head(&path).await {
            Ok(meta) => return Ok(PathAttributes::file(include_size.then_some(meta.size))),
            Err(e) => match map_head_error(e, location) {
                TransferError::NotFound(_) => {}
                TransferError::Authentication(_) => return Ok(PathAttributes::inaccessible()),
                other => return Err(other),
            },
        }

        // No object under that key: it may still be a directory prefix.
        match store.list_with_delimiter(Some(&path)).await {
            Ok(listing) if !listing.objects.is_empty() || !listing.common_prefixes.is_empty() => {
                Ok(PathAttributes::directory())
            }
            Ok(_) => Ok(PathAttributes::missing()),
            Err(e) => match map_head_error(e, location) {
                TransferError::NotFound(_) => Ok(PathAttributes::missing()),
                TransferError::Authentication(_) => Ok(PathAttributes::inaccessible()),
                other => Err(other),
            },
        }
    }

    async fn generate_download_url(
        &self,
        token: &AuthToken,
        location: &FileLocation,
        expiration: Duration,
    ) -> TransferResult<String> {
        let store = self.store(token, &location.container_id)?;
        let url = store
            .signed_url(Method::GET, &Path::from(location.file_id.as_str()), expiration)
            .await
            .map_err(|e| TransferError::BackendError(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn scan_directory(
        &self,
        token: &AuthToken,
        location: &FileLocation,
    ) -> TransferResult<Vec<DirectoryScanItem>> {
        let store = self.store(token, &location.container_id)?;
        let prefix = Path::from(location.file_id.as_str());

        let objects: Vec<_> = store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| TransferError::BackendError(e.to_string()))?;

        Ok(objects
            .into_iter()
            .map(|meta| DirectoryScanItem {
                file_path: meta.location.to_string(),
                size: meta.size,
                last_modified: Some(meta.last_modified),
            })
            .collect())
    }
}
