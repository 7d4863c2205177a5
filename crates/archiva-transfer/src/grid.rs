use std::sync::Arc;

use archiva_core::models::{
    ArchiveDestination, ArchiveType, DirectoryScanItem, DownloadDestination, DownloadRequest,
    DownloadResponse, DownloadStatus, DownloadStatusReport, FileLocation,
    IntegratedSystemAccount, MetadataEntry, PathAttributes, UploadRequest, UploadResponse,
    UploadSource, UploadStatus, UploadStatusReport,
};
use archiva_core::{resolve_archive_destination, BackendType, TransferSettings};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http_util::{build_client, check_status, request_failed};
use crate::progress::TransferProgressListener;
use crate::token::AuthToken;
use crate::traits::{TransferError, TransferProxy, TransferResult};

const DEFAULT_SCOPE: &str = "urn:globus:auth:scope:transfer.api.globus.org:all";
const UPLOAD_LABEL_PREFIX: &str = "archiva-upload";
const DOWNLOAD_LABEL: &str = "archiva-download";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SubmissionId {
    value: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    bytes_transferred: u64,
    #[serde(default)]
    nice_status_short_description: Option<String>,
}

#[derive(Deserialize)]
struct TaskList {
    total: usize,
}

#[derive(Deserialize)]
struct DirectoryListing {
    #[serde(rename = "DATA", default)]
    data: Vec<DirectoryEntry>,
}

#[derive(Deserialize)]
struct DirectoryEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    last_modified: Option<String>,
}

#[derive(Serialize)]
struct TransferItem<'a> {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    source_path: &'a str,
    destination_path: &'a str,
}

/// Grid transfer proxy over the REST transfer service.
///
/// Upload and download submit a task and return its id; completion is
/// observed through `get_upload_status` / `get_download_status`. The task
/// label records the archive type so status polling needs no local state.
pub struct GridTransferProxy {
    client: Client,
    api_url: String,
    auth_url: String,
    max_active_tasks: usize,
}

impl GridTransferProxy {
    pub fn new(settings: &TransferSettings) -> TransferResult<Self> {
        Ok(Self {
            client: build_client(settings.http_timeout_secs)?,
            api_url: settings.grid_transfer_api_url.trim_end_matches('/').to_string(),
            auth_url: settings.grid_auth_url.trim_end_matches('/').to_string(),
            max_active_tasks: settings.grid_max_active_tasks,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        token: &AuthToken,
        path: &str,
        operation: &str,
    ) -> TransferResult<T> {
        let access_token = token.bearer_for(BackendType::GridTransfer)?;
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| request_failed(operation, e))?;
        check_status(response, operation)
            .await?
            .json()
            .await
            .map_err(|e| TransferError::BackendError(format!("{}: {}", operation, e)))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        token: &AuthToken,
        path: &str,
        body: &serde_json::Value,
        operation: &str,
    ) -> TransferResult<T> {
        let access_token = token.bearer_for(BackendType::GridTransfer)?;
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(operation, e))?;
        check_status(response, operation)
            .await?
            .json()
            .await
            .map_err(|e| TransferError::BackendError(format!("{}: {}", operation, e)))
    }

    async fn submission_id(&self, token: &AuthToken) -> TransferResult<String> {
        let id: SubmissionId = self
            .get_json(token, "submission_id", "Submission id request")
            .await?;
        Ok(id.value)
    }

    async fn submit_transfer(
        &self,
        token: &AuthToken,
        source: &FileLocation,
        destination: &FileLocation,
        label: &str,
    ) -> TransferResult<String> {
        let submission_id = self.submission_id(token).await?;
        let item = TransferItem {
            data_type: "transfer_item",
            source_path: &source.file_id,
            destination_path: &destination.file_id,
        };
        let body = json!({
            "DATA_TYPE": "transfer",
            "submission_id": submission_id,
            "label": label,
            "source_endpoint": source.container_id,
            "destination_endpoint": destination.container_id,
            "verify_checksum": true,
            "DATA": [item],
        });

        let response: SubmitResponse = self
            .post_json(token, "transfer", &body, "Transfer submission")
            .await?;
        Ok(response.task_id)
    }

    async fn task(&self, token: &AuthToken, task_id: &str) -> TransferResult<TaskResponse> {
        self.get_json(
            token,
            &format!("task/{}", urlencoding::encode(task_id)),
            "Task status request",
        )
        .await
    }

    async fn list_directory(
        &self,
        token: &AuthToken,
        endpoint: &str,
        path: &str,
    ) -> TransferResult<Vec<DirectoryEntry>> {
        let listing: DirectoryListing = self
            .get_json(
                token,
                &format!(
                    "operation/endpoint/{}/ls?path={}",
                    urlencoding::encode(endpoint),
                    urlencoding::encode(path)
                ),
                "Directory listing",
            )
            .await?;
        Ok(listing.data)
    }
}

fn upload_label(archive_type: ArchiveType) -> String {
    format!("{}:{}", UPLOAD_LABEL_PREFIX, archive_type)
}

fn archive_type_from_label(label: Option<&str>) -> ArchiveType {
    label
        .and_then(|l| l.strip_prefix(UPLOAD_LABEL_PREFIX))
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|t| t.parse().ok())
        .unwrap_or(ArchiveType::Archive)
}

fn upload_status_for(task_status: &str, archive_type: ArchiveType) -> UploadStatus {
    match task_status {
        "SUCCEEDED" => UploadStatus::arrived_in(archive_type),
        "FAILED" | "INACTIVE" => UploadStatus::Failed,
        _ => UploadStatus::in_progress_to(archive_type),
    }
}

fn download_status_for(task_status: &str) -> DownloadStatus {
    match task_status {
        "SUCCEEDED" => DownloadStatus::Completed,
        "FAILED" | "INACTIVE" => DownloadStatus::Failed,
        _ => DownloadStatus::InProgress,
    }
}

/// Split `/a/b/c` into (`/a/b`, `c`).
fn split_parent(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}

fn parse_last_modified(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S%:z").ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl TransferProxy for GridTransferProxy {
    fn backend_type(&self) -> BackendType {
        BackendType::GridTransfer
    }

    async fn authenticate(&self, account: &IntegratedSystemAccount) -> TransferResult<AuthToken> {
        let scope = account.property("scope").unwrap_or(DEFAULT_SCOPE);
        let response = self
            .client
            .post(format!("{}/v2/oauth2/token", self.auth_url))
            .basic_auth(&account.username, Some(&account.password))
            .form(&[("grant_type", "client_credentials"), ("scope", scope)])
            .send()
            .await
            .map_err(|e| request_failed("Grid authentication", e))?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Err(TransferError::Authentication(format!(
                "grid transfer rejected client {}",
                account.username
            )));
        }

        let token: TokenResponse = check_status(response, "Grid authentication")
            .await?
            .json()
            .await
            .map_err(|e| TransferError::Authentication(e.to_string()))?;

        Ok(AuthToken::from_bearer(
            BackendType::GridTransfer,
            token.access_token,
        ))
    }

    async fn upload(
        &self,
        token: &AuthToken,
        request: &UploadRequest,
        base_archive: &ArchiveDestination,
        _metadata: &[MetadataEntry],
        _listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> TransferResult<UploadResponse> {
        let UploadSource::Location(ref source) = request.source else {
            return Err(TransferError::InvalidRequest(
                "grid transfer uploads need a source endpoint location".to_string(),
            ));
        };

        let destination = resolve_archive_destination(
            &base_archive.file_location,
            &request.path,
            request.caller_namespace.as_deref(),
            base_archive.archive_type,
            request.unique,
        );

        let task_id = self
            .submit_transfer(token, source, &destination, &upload_label(base_archive.archive_type))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    source = %source,
                    archive_location = %destination,
                    "Grid transfer upload submission failed"
                );
                e.with_archive_location(destination.clone())
            })?;

        tracing::info!(
            source = %source,
            archive_location = %destination,
            task_id = %task_id,
            "Grid transfer upload submitted"
        );

        Ok(UploadResponse {
            archive_location: destination,
            request_id: task_id,
            status: UploadStatus::in_progress_to(base_archive.archive_type),
            upload_url: None,
            source_size: request.size,
        })
    }

    async fn download(
        &self,
        token: &AuthToken,
        request: &DownloadRequest,
        _base_archive: &ArchiveDestination,
        _listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> TransferResult<DownloadResponse> {
        let DownloadDestination::Location(ref destination) = request.destination else {
            return Err(TransferError::InvalidRequest(
                "grid transfer downloads need a destination endpoint location".to_string(),
            ));
        };

        let task_id = self
            .submit_transfer(token, &request.archive_location, destination, DOWNLOAD_LABEL)
            .await?;

        tracing::info!(
            archive_location = %request.archive_location,
            destination = %destination,
            task_id = %task_id,
            "Grid transfer download submitted"
        );

        Ok(DownloadResponse { request_id: task_id })
    }

    async fn delete(&self, token: &AuthToken, location: &FileLocation) -> TransferResult<()> {
        let submission_id = self.submission_id(token).await?;
        let body = json!({
            "DATA_TYPE": "delete",
            "submission_id": submission_id,
            "endpoint": location.container_id,
            "recursive": false,
            "DATA": [{ "DATA_TYPE": "delete_item", "path": location.file_id }],
        });

        let _: SubmitResponse = self
            .post_json(token, "delete", &body, "Delete submission")
            .await
            .map_err(|e| match e {
                TransferError::BackendError(msg) => TransferError::DeleteFailed(msg),
                other => other,
            })?;

        tracing::info!(archive_location = %location, "Grid transfer delete submitted");
        Ok(())
    }

    async fn get_upload_status(
        &self,
        token: &AuthToken,
        request_id: &str,
    ) -> TransferResult<UploadStatusReport> {
        let task = self.task(token, request_id).await?;
        let archive_type = archive_type_from_label(task.label.as_deref());
        Ok(UploadStatusReport {
            status: upload_status_for(&task.status, archive_type),
            bytes_transferred: task.bytes_transferred,
            message: task.nice_status_short_description,
        })
    }

    async fn get_download_status(
        &self,
        token: &AuthToken,
        request_id: &str,
    ) -> TransferResult<DownloadStatusReport> {
        let task = self.task(token, request_id).await?;
        Ok(DownloadStatusReport {
            status: download_status_for(&task.status),
            bytes_transferred: task.bytes_transferred,
            message: task.nice_status_short_description,
        })
    }

    async fn get_transferred_bytes(
        &self,
        token: &AuthToken,
        request_id: &str,
    ) -> TransferResult<u64> {
        Ok(self.task(token, request_id).await?.bytes_transferred)
    }

    async fn get_path_attributes(
        &self,
        token: &AuthToken,
        location: &FileLocation,
        include_size: bool,
    ) -> TransferResult<PathAttributes> {
        let (parent, name) = split_parent(&location.file_id);

        let entries = match self
            .list_directory(token, &location.container_id, &parent)
            .await
        {
            Ok(entries) => entries,
            Err(TransferError::NotFound(_)) => return Ok(PathAttributes::missing()),
            Err(TransferError::Authentication(_)) => return Ok(PathAttributes::inaccessible()),
            Err(e) => return Err(e),
        };

        Ok(match entries.into_iter().find(|e| e.name == name) {
            Some(entry) if entry.entry_type == "dir" => PathAttributes::directory(),
            Some(entry) => PathAttributes::file(include_size.then_some(entry.size)),
            None => PathAttributes::missing(),
        })
    }

    async fn scan_directory(
        &self,
        token: &AuthToken,
        location: &FileLocation,
    ) -> TransferResult<Vec<DirectoryScanItem>> {
        let mut items = Vec::new();
        let mut pending = vec![location.file_id.trim_end_matches('/').to_string()];

        while let Some(directory) = pending.pop() {
            for entry in self
                .list_directory(token, &location.container_id, &directory)
                .await?
            {
                let path = format!("{}/{}", directory, entry.name);
                if entry.entry_type == "dir" {
                    pending.push(path);
                } else {
                    items.push(DirectoryScanItem {
                        file_path: path,
                        size: entry.size,
                        last_modified: parse_last_modified(entry.last_modified.as_deref()),
                    });
                }
            }
        }

        Ok(items)
    }

    async fn cancel_transfer(
        &self,
        token: &AuthToken,
        request_id: &str,
        message: &str,
    ) -> TransferResult<()> {
        let _: serde_json::Value = self
            .post_json(
                token,
                &format!("task/{}/cancel", urlencoding::encode(request_id)),
                &json!({}),
                "Task cancellation",
            )
            .await?;
        tracing::info!(task_id = %request_id, reason = %message, "Grid transfer task cancelled");
        Ok(())
    }

    async fn accepts_transfer_requests(&self, token: &AuthToken) -> TransferResult<bool> {
        let tasks: TaskList = self
            .get_json(
                token,
                "task_list?filter=status:ACTIVE,INACTIVE&limit=1",
                "Task list request",
            )
            .await?;
        Ok(tasks.total < self.max_active_tasks)
    }
}
