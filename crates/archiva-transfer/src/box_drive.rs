use std::sync::Arc;

use archiva_core::models::{
    ArchiveDestination, DownloadDestination, DownloadRequest, DownloadResponse,
    DownloadStatusReport, IntegratedSystemAccount,
};
use archiva_core::{BackendType, TransferSettings};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
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

/// Folder id Box uses for the root of an account.
const ROOT_FOLDER_ID: &str = "0";

/// Box proxy.
///
/// Same contract as the Google Drive proxy: asynchronous downloads into a
/// Box folder, everything else unsupported.
pub struct BoxProxy {
    client: Client,
    streaming_client: Client,
    api_url: String,
    upload_url: String,
    reporting_rate: u64,
    tracker: TransferTracker,
}

impl BoxProxy {
    pub fn new(settings: &TransferSettings, tracker: TransferTracker) -> TransferResult<Self> {
        Ok(Self {
            client: build_client(settings.http_timeout_secs)?,
            streaming_client: build_streaming_client(settings.http_timeout_secs)?,
            api_url: settings.box_api_url.trim_end_matches('/').to_string(),
            upload_url: settings.box_upload_url.trim_end_matches('/').to_string(),
            reporting_rate: settings.progress_reporting_rate_bytes,
            tracker,
        })
    }
}

async fn copy_into_box(
    client: Client,
    upload_url: String,
    access_token: String,
    source_url: String,
    folder_id: Option<String>,
    file_name: String,
    reporter: Arc<ProgressReporter>,
) -> TransferResult<()> {
    let (stream, content_length) = open_source(&client, &source_url, reporter).await?;

    let attributes = json!({
        "name": file_name,
        "parent": { "id": folder_id.as_deref().unwrap_or(ROOT_FOLDER_ID) },
    });
    let body = Body::wrap_stream(stream);
    let file_part = match content_length {
        Some(length) => Part::stream_with_length(body, length),
        None => Part::stream(body),
    }
    .file_name(file_name);
    let form = Form::new()
        .text("attributes", attributes.to_string())
        .part("file", file_part);

    let response = client
        .post(format!("{}/2.0/files/content", upload_url))
        .bearer_auth(&access_token)
        .multipart(form)
        .send()
        .await
        .map_err(|e| request_failed("Box upload", e))?;
    check_status(response, "Box upload").await?;

    Ok(())
}

#[async_trait]
impl TransferProxy for BoxProxy {
    fn backend_type(&self) -> BackendType {
        BackendType::Box
    }

    async fn authenticate(&self, account: &IntegratedSystemAccount) -> TransferResult<AuthToken> {
        let response = self
            .client
            .get(format!("{}/2.0/users/me", self.api_url))
            .bearer_auth(&account.password)
            .send()
            .await
            .map_err(|e| request_failed("Box authentication", e))?;
        check_status(response, "Box authentication")
            .await
            .map_err(|e| match e {
                TransferError::Authentication(_) | TransferError::InvalidRequest(_) => {
                    TransferError::Authentication("Box rejected the access token".to_string())
                }
                other => other,
            })?;

        Ok(AuthToken::from_bearer(BackendType::Box, account.password.clone()))
    }

    async fn download(
        &self,
        token: &AuthToken,
        request: &DownloadRequest,
        _base_archive: &ArchiveDestination,
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> TransferResult<DownloadResponse> {
        let access_token = token.bearer_for(BackendType::Box)?.to_string();
        let Some(listener) = listener else {
            return Err(TransferError::InvalidRequest(
                "Box downloads need a progress listener".to_string(),
            ));
        };
        let DownloadDestination::Drive {
            ref folder_id,
            ref file_name,
        } = request.destination
        else {
            return Err(TransferError::InvalidRequest(
                "Box downloads need a Box folder destination".to_string(),
            ));
        };
        let Some(ref source_url) = request.source_url else {
            return Err(TransferError::InvalidRequest(
                "Box downloads need a pre-signed archive URL".to_string(),
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
            BackendType::Box,
            self.tracker.clone(),
            request_id.clone(),
            reporter.clone(),
            copy_into_box(
                self.streaming_client.clone(),
                self.upload_url.clone(),
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
            "Box download started"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ChannelProgressListener, ProgressEvent};
    use archiva_core::models::{ArchiveType, DownloadStatus, FileLocation};
    use mockito::Matcher;

    fn proxy(server: &mockito::Server) -> BoxProxy {
        let settings = TransferSettings {
            box_api_url: server.url(),
            box_upload_url: server.url(),
            ..TransferSettings::default()
        };
        BoxProxy::new(&settings, TransferTracker::new()).unwrap()
    }

    fn base() -> ArchiveDestination {
        ArchiveDestination {
            file_location: FileLocation::new("bucket", "archive"),
            archive_type: ArchiveType::Archive,
        }
    }

    #[tokio::test]
    async fn test_authenticate_accepts_valid_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/2.0/users/me")
            .match_header("authorization", "Bearer box-token")
            .with_body(r#"{"id": "42", "type": "user"}"#)
            .create_async()
            .await;

        let token = proxy(&server)
            .authenticate(&IntegratedSystemAccount::new("svc", "box-token"))
            .await
            .unwrap();
        assert_eq!(token.backend(), BackendType::Box);
    }

    #[tokio::test]
    async fn test_download_rejects_local_destination() {
        let server = mockito::Server::new_async().await;
        let (listener, _events) = ChannelProgressListener::channel();
        let request = DownloadRequest {
            path: "/Tenant/a.dat".to_string(),
            archive_location: FileLocation::new("bucket", "archive/Tenant/a.dat"),
            source_url: Some("http://localhost/a".to_string()),
            destination: DownloadDestination::File("/tmp/a.dat".into()),
            size: None,
        };

        let result = proxy(&server)
            .download(
                &AuthToken::from_bearer(BackendType::Box, "t"),
                &request,
                &base(),
                Some(listener),
            )
            .await;
        assert!(matches!(result, Err(TransferError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_download_uploads_multipart_into_folder() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/archive/a.dat")
            .with_body("box bytes")
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/2.0/files/content")
            .match_header("authorization", "Bearer box-token")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data; boundary=.*".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""parent":\{"id":"0"\}"#.to_string()),
                Matcher::Regex("box bytes".to_string()),
            ]))
            .with_status(201)
            .with_body(r#"{"entries": [{"id": "7"}]}"#)
            .create_async()
            .await;

        let p = proxy(&server);
        let token = AuthToken::from_bearer(BackendType::Box, "box-token");
        let (listener, mut events) = ChannelProgressListener::channel();
        let request = DownloadRequest {
            path: "/Tenant/a.dat".to_string(),
            archive_location: FileLocation::new("bucket", "archive/Tenant/a.dat"),
            source_url: Some(format!("{}/archive/a.dat", server.url())),
            destination: DownloadDestination::Drive {
                folder_id: None,
                file_name: "a.dat".to_string(),
            },
            size: Some(9),
        };

        let response = p
            .download(&token, &request, &base(), Some(listener))
            .await
            .unwrap();

        let mut terminal = None;
        while let Some(event) = events.recv().await {
            if event.is_terminal() {
                terminal = Some(event);
                break;
            }
        }
        assert_eq!(terminal, Some(ProgressEvent::Completed(9)));
        upload.assert_async().await;
        let status = p
            .get_download_status(&token, &response.request_id)
            .await
            .unwrap();
        assert_eq!(status.status, DownloadStatus::Completed);
    }
}
