//! Shared plumbing of the REST-backed proxies.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use archiva_core::BackendType;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};

use crate::progress::ProgressReporter;
use crate::tracker::TransferTracker;
use crate::traits::{TransferError, TransferResult};

pub(crate) fn build_client(timeout_secs: u64) -> TransferResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TransferError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Client for long-running body transfers; only the connect phase is bounded.
#[cfg(any(feature = "backend-cloud-drives", feature = "backend-object-storage"))]
pub(crate) fn build_streaming_client(timeout_secs: u64) -> TransferResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TransferError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Pass successful responses through; map the rest to a `TransferError`.
pub(crate) async fn check_status(response: Response, operation: &str) -> TransferResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{} failed with status {}: {}", operation, status, body);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransferError::Authentication(message),
        StatusCode::NOT_FOUND => TransferError::NotFound(message),
        StatusCode::BAD_REQUEST => TransferError::InvalidRequest(message),
        _ => TransferError::BackendError(message),
    })
}

pub(crate) fn request_failed(operation: &str, err: reqwest::Error) -> TransferError {
    TransferError::BackendError(format!("{} request failed: {}", operation, err))
}

/// Open a pre-signed source URL as a byte stream that advances `reporter`.
#[cfg(feature = "backend-cloud-drives")]
pub(crate) async fn open_source(
    client: &Client,
    url: &str,
    reporter: Arc<ProgressReporter>,
) -> TransferResult<(
    impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    Option<u64>,
)> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| request_failed("Archive read", e))?;
    let response = check_status(response, "Archive read").await?;
    let content_length = response.content_length();

    let stream = response.bytes_stream().map(move |chunk| {
        if let Ok(ref bytes) = chunk {
            reporter.advance(bytes.len() as u64);
        }
        chunk
    });

    Ok((stream, content_length))
}

/// Run `work` in the background and settle the tracker entry and the
/// listener with its outcome.
#[cfg(any(feature = "backend-cloud-drives", feature = "backend-object-storage"))]
pub(crate) fn spawn_tracked<F>(
    backend: BackendType,
    tracker: TransferTracker,
    request_id: String,
    reporter: Arc<ProgressReporter>,
    work: F,
) where
    F: Future<Output = TransferResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let start = std::time::Instant::now();
        match work.await {
            Ok(()) => {
                let size = reporter.transferred();
                tracker.complete(&request_id, Some(size)).await;
                reporter.complete();
                tracing::info!(
                    backend = %backend,
                    request_id = %request_id,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Asynchronous transfer completed"
                );
            }
            Err(e) => {
                let message = e.to_string();
                tracker.fail(&request_id, &message).await;
                reporter.fail(&message);
                tracing::error!(
                    error = %e,
                    backend = %backend,
                    request_id = %request_id,
                    bytes_transferred = reporter.transferred(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Asynchronous transfer failed"
                );
            }
        }
    });
}
