//! Traits for external collaborators
//!
//! The control plane reads tenant configuration from a store and drives the
//! data-management service for batch downloads. Both live outside this
//! workspace's core; concrete implementations sit in `archiva-db` and
//! `archiva-api-client`, and tests supply in-memory ones.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::AppResult;
use crate::models::{CollectionListing, TenantConfig};

/// Stream of bytes produced by a collaborator.
pub type ByteStream = Pin<Box<dyn Stream<Item = AppResult<Bytes>> + Send>>;

/// Source of tenant configuration records.
#[async_trait]
pub trait TenantConfigStore: Send + Sync {
    /// Every configuration record, in store order.
    async fn list_tenant_configs(&self) -> AppResult<Vec<TenantConfig>>;
}

/// How the data-management service should deliver a data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// Return a URL the bytes can be fetched from.
    RedirectUrl,
    /// Stream the bytes in the response itself.
    Stream,
}

pub enum DownloadHandle {
    RedirectUrl(String),
    Stream(ByteStream),
}

impl std::fmt::Debug for DownloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadHandle::RedirectUrl(url) => f.debug_tuple("RedirectUrl").field(url).finish(),
            DownloadHandle::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Data-management operations the batch pipeline depends on.
///
/// Rejections of a delivery mode are reported as `AppError::InvalidInput`, so
/// callers can fall back to the other mode.
#[async_trait]
pub trait DataManagementService: Send + Sync {
    /// Direct children of a collection.
    async fn list_collection(&self, path: &str) -> AppResult<CollectionListing>;

    /// Start a download of one data object.
    async fn initiate_download(&self, path: &str, mode: DownloadMode) -> AppResult<DownloadHandle>;

    /// Fetch the bytes behind a redirect URL.
    async fn open_url(&self, url: &str) -> AppResult<ByteStream>;
}
