//! HTTP client for the data-management API.
//!
//! Provides a minimal client with Bearer auth, status-to-error mapping and
//! the `DataManagementService` implementation the batch download pipeline
//! runs against.

pub mod api;

use std::time::Duration;

use archiva_core::{AppError, AppResult, BatchDownloadSettings};
use reqwest::{Client, RequestBuilder, Response, StatusCode};

pub use api::{CollectionListResponse, DataObjectDownloadResponse};

/// HTTP client for the data-management API.
#[derive(Clone, Debug)]
pub struct DataManagementApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl DataManagementApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_settings(settings: &BatchDownloadSettings) -> AppResult<Self> {
        Self::new(
            &settings.data_management_url,
            settings.data_management_token.clone(),
            Duration::from_secs(settings.api_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{resource}/{logical path}` with every path segment percent-encoded.
    pub fn build_url(&self, resource: &str, logical_path: &str) -> String {
        let encoded: Vec<String> = logical_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}/{}", self.base_url, resource, encoded.join("/"))
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) async fn send(&self, request: RequestBuilder, operation: &str) -> AppResult<Response> {
        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(|e| AppError::DataTransfer(format!("{} request failed: {}", operation, e)))?;
        check_status(response, operation).await
    }

    /// Raw client for requests outside the API, such as redirect URLs.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Pass successful responses through; map the rest to an `AppError`.
pub(crate) async fn check_status(response: Response, operation: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = format!("{} failed with status {}: {}", operation, status, error_text);
    Err(match status {
        StatusCode::BAD_REQUEST => AppError::InvalidInput(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Authentication(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        _ => AppError::DataTransfer(message),
    })
}
