use std::sync::Arc;

use archiva_core::models::{
    ArchiveDestination, DownloadDestination, DownloadRequest, DownloadResponse,
    DownloadStatusReport, IntegratedSystemAccount,
};
use archiva_core::{BackendType, TransferSettings};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, LOCATION};
use reqwest::{Body, Client};
use serde_json::json;
use uuid::Uuid;

use crate::http_util::{
    build_client, build_streaming_client, check_status, open_source, request_failed,
    spawn_tracked,
};
use crate::progress::{ProgressReporter, TransferProgressListener};
use crate::token::AuthToken;
use crate::tracker::{TransferDirection, TransferTracker};
use crate::traits::{TransferError, TransferProxy, TransferResult};

/// Google Drive proxy.
///
/// Only downloads out of the archive into a drive folder are supported. The
/// transfer runs in a background task; the caller learns the outcome through
/// the mandatory progress listener or by polling `get_download_status`.
/// The account's `password` holds an OAuth access token.
pub struct GoogleDriveProxy {
    client: Client,
    streaming_client: Client,
    api_url: String,
    reporting_rate: u64,
    tracker: TransferTracker,
}

impl GoogleDriveProxy {
    pub fn new(settings: &TransferSettings, tracker: TransferTracker) -> TransferResult<Self> {
        Ok(Self {
            client: build_client(settings.http_timeout_secs)?,
            streaming_client: build_streaming_client(settings.http_timeout_secs)?,
            api_url: settings.google_drive_api_url.trim_end_matches('/').to_string(),
            reporting_rate: settings.progress_reporting_rate_bytes,
            tracker,
        })
    }
}

/// Stream the archived object into a new drive file using a resumable upload session.
async fn copy_into_drive(
    client: Client,
    api_url: String,
    access_token: String,
    source_url: String,
    folder_id: Option<String>,
    file_name: String,
    reporter: Arc<ProgressReporter>,
) -> TransferResult<()> {
    let (stream, content_length) = open_source(&client, &source_url, reporter).await?;

    let mut metadata = json!({ "name": file_name });
    if let Some(folder) = folder_id {
        metadata["parents"] = json!([folder]);
    }

    let mut session_request = client
        .post(format!("{}/upload/drive/v3/files?uploadType=resumable", api_url))
        .bearer_auth(&access_token)
        .json(&metadata);
    if let Some(length) = content_length {
        session_request = session_request.header("X-Upload-Content-Length", length);
    }
    let session = session_request
        .send()
        .await
        .map_err(|e| request_failed("Drive upload session", e))?;
    let session = check_status(session, "Drive upload session").await?;
    let session_url = session
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .ok_or_else(|| {
            TransferError::BackendError("Drive upload session returned no location".to_string())
        })?;

    let mut upload = client
        .put(session_url)
        .bearer_auth(&access_token)
        .body(Body::wrap_stream(stream));
    if let Some(length) = content_length {
        upload = upload.header(CONTENT_LENGTH, length);
    }
    let response = upload
        .send()
        .await
        .map_err(|e| request_failed("Drive upload", e))?;
    check_status(response, "Drive upload").await?;

    Ok(())
}

#[async_trait]
impl TransferProxy for GoogleDriveProxy {
    fn backend_type(&self) -> BackendType {
        BackendType::GoogleDrive
    }

    async fn authenticate(&self, account: &IntegratedSystemAccount) -> TransferResult<AuthToken> {
        let response = self
            .client
            .get(format!("{}/drive/v3/about?fields=user", self.api_url))
            .bearer_auth(&account.password)
            .send()
            .await
            .map_err(|e| request_failed("Drive authentication", e))?;
        check_status(response, "Drive authentication")
            .await
            .map_err(|e| match e {
                TransferError::Authentication(_) | TransferError::InvalidRequest(_) => {
                    TransferError::Authentication("Google Drive rejected the access token".to_string())
                }
                other => other,
            })?;

        Ok(AuthToken::from_bearer(
            BackendType::GoogleDrive,
            account.password.clone(),
        ))
    }

    async fn download(
        &self,
        token: &AuthToken,
        request: &DownloadRequest,
        _base_archive: &ArchiveDestination,
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> TransferResult<DownloadResponse> {
        let access_token = token.bearer_for(BackendType::GoogleDrive)?.to_string();
        let Some(listener) = listener else {
            return Err(TransferError::InvalidRequest(
                "Google Drive downloads need a progress listener".to_string(),
            ));
        };
        let DownloadDestination::Drive {
            ref folder_id,
            ref file_name,
        } = request.destination
        else {
            return Err(TransferError::InvalidRequest(
                "Google Drive downloads need a drive folder destination".to_string(),
            ));
        };
        let Some(ref source_url) = request.source_url else {
            return Err(TransferError::InvalidRequest(
                "Google Drive downloads need a pre-signed archive URL".to_string(),
            ));
        };

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
        let reporter = Arc::new(ProgressReporter::with_counter(
            Some(listener),
            self.reporting_rate,
            counter,
        ));

        spawn_tracked(
            BackendType::GoogleDrive,
            self.tracker.clone(),
            request_id.clone(),
            reporter.clone(),
            copy_into_drive(
                self.streaming_client.clone(),
                self.api_url.clone(),
                access_token,
                source_url.clone(),
                folder_id.clone(),
                file_name.clone(),
                reporter,
            ),
        );

        tracing::info!(
            archive_location = %request.archive_location,
            request_id = %request_id,
            file_name = %file_name,
            "Google Drive download started"
        );

        Ok(DownloadResponse { request_id })
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
}
