//! Data-management endpoints used by batch downloads.

use archiva_core::models::{CollectionListing, DataObjectDescriptor};
use archiva_core::{
    AppError, AppResult, ByteStream, DataManagementService, DownloadHandle, DownloadMode,
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::{check_status, DataManagementApiClient};

/// `GET /collection/{path}?list=true` response.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionListResponse {
    #[serde(default)]
    pub collections: Vec<CollectionEnvelope>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEnvelope {
    pub collection: CollectionEntry,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub data_objects: Vec<ListingEntry>,
    #[serde(default)]
    pub sub_collections: Vec<ListingEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub path: String,
    #[serde(default)]
    pub data_size: Option<u64>,
}

/// `POST /dataObject/{path}/download` response when a URL was requested.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObjectDownloadResponse {
    #[serde(rename = "downloadRequestURL")]
    pub download_request_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct DownloadRequestBody {
    #[serde(rename = "generateDownloadRequestURL")]
    generate_download_request_url: bool,
}

fn into_byte_stream(response: reqwest::Response) -> ByteStream {
    response
        .bytes_stream()
        .map_err(|e| AppError::DataTransfer(format!("Download stream interrupted: {}", e)))
        .boxed()
}

#[async_trait]
impl DataManagementService for DataManagementApiClient {
    async fn list_collection(&self, path: &str) -> AppResult<CollectionListing> {
        let url = self.build_url("collection", path);
        let request = self.client().get(&url).query(&[("list", "true")]);
        let response = self.send(request, "Collection listing").await?;

        let body: CollectionListResponse = response.json().await.map_err(|e| {
            AppError::DataTransfer(format!("Failed to parse collection listing: {}", e))
        })?;
        let entry = body
            .collections
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Collection not found: {}", path)))?
            .collection;

        tracing::debug!(
            path,
            data_objects = entry.data_objects.len(),
            sub_collections = entry.sub_collections.len(),
            "Collection listed"
        );

        Ok(CollectionListing {
            path: path.to_string(),
            data_objects: entry
                .data_objects
                .into_iter()
                .map(|object| DataObjectDescriptor {
                    path: object.path,
                    size: object.data_size,
                })
                .collect(),
            sub_collections: entry
                .sub_collections
                .into_iter()
                .map(|collection| collection.path)
                .collect(),
        })
    }

    async fn initiate_download(&self, path: &str, mode: DownloadMode) -> AppResult<DownloadHandle> {
        let url = format!("{}/download", self.build_url("dataObject", path));
        let body = DownloadRequestBody {
            generate_download_request_url: mode == DownloadMode::RedirectUrl,
        };
        let request = self.client().post(&url).json(&body);
        let response = self.send(request, "Data object download").await?;

        match mode {
            DownloadMode::RedirectUrl => {
                let body: DataObjectDownloadResponse = response.json().await.map_err(|e| {
                    AppError::DataTransfer(format!("Failed to parse download response: {}", e))
                })?;
                body.download_request_url
                    .map(DownloadHandle::RedirectUrl)
                    .ok_or_else(|| {
                        AppError::DataTransfer(format!("No download URL returned for {}", path))
                    })
            }
            DownloadMode::Stream => Ok(DownloadHandle::Stream(into_byte_stream(response))),
        }
    }

    async fn open_url(&self, url: &str) -> AppResult<ByteStream> {
        let response = self
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::DataTransfer(format!("Redirect download failed: {}", e)))?;
        let response = check_status(response, "Redirect download").await?;
        Ok(into_byte_stream(response))
    }
}
