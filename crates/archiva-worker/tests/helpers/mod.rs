//! Test helpers: in-memory data-management service and batch fixtures.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use archiva_core::models::{CollectionListing, DataObjectDescriptor};
use archiva_core::{
    AppError, AppResult, ByteStream, DataManagementService, DownloadHandle, DownloadMode,
};
use archiva_worker::{BatchCollectionDownloadPipeline, BatchSinks, TokioFileSystem};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tempfile::TempDir;

const REDIRECT_SCHEME: &str = "mem://";

/// Data-management service backed by maps.
#[derive(Default)]
pub struct InMemoryDataManagement {
    collections: HashMap<String, CollectionListing>,
    objects: HashMap<String, Vec<u8>>,
    /// Objects whose redirect download is refused with HTTP 400.
    stream_only: HashSet<String>,
    /// Objects whose download always fails.
    broken: HashSet<String>,
    pub list_calls: AtomicUsize,
    pub stream_fallbacks: AtomicUsize,
}

impl InMemoryDataManagement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(mut self, path: &str, sub_collections: &[&str]) -> Self {
        let listing = self
            .collections
            .entry(path.to_string())
            .or_insert_with(|| CollectionListing {
                path: path.to_string(),
                ..CollectionListing::default()
            });
        listing
            .sub_collections
            .extend(sub_collections.iter().map(|s| s.to_string()));
        self
    }

    pub fn object(mut self, collection: &str, path: &str, content: &[u8]) -> Self {
        self = self.collection(collection, &[]);
        if let Some(listing) = self.collections.get_mut(collection) {
            listing.data_objects.push(DataObjectDescriptor {
                path: path.to_string(),
                size: Some(content.len() as u64),
            });
        }
        self.objects.insert(path.to_string(), content.to_vec());
        self
    }

    pub fn stream_only(mut self, path: &str) -> Self {
        self.stream_only.insert(path.to_string());
        self
    }

    pub fn broken(mut self, path: &str) -> Self {
        self.broken.insert(path.to_string());
        self
    }

    fn content(&self, path: &str) -> AppResult<Vec<u8>> {
        self.objects
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Data object not found: {}", path)))
    }
}

fn byte_stream(content: Vec<u8>) -> ByteStream {
    let chunks: Vec<AppResult<Bytes>> = content
        .chunks(4)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    futures::stream::iter(chunks).boxed()
}

#[async_trait]
impl DataManagementService for InMemoryDataManagement {
    async fn list_collection(&self, path: &str) -> AppResult<CollectionListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.collections
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Collection not found: {}", path)))
    }

    async fn initiate_download(&self, path: &str, mode: DownloadMode) -> AppResult<DownloadHandle> {
        if self.broken.contains(path) {
            return Err(AppError::DataTransfer(format!("archive unavailable for {}", path)));
        }
        match mode {
            DownloadMode::RedirectUrl if self.stream_only.contains(path) => Err(
                AppError::InvalidInput("URL download not supported for this object".to_string()),
            ),
            DownloadMode::RedirectUrl => Ok(DownloadHandle::RedirectUrl(format!(
                "{}{}",
                REDIRECT_SCHEME, path
            ))),
            DownloadMode::Stream => {
                self.stream_fallbacks.fetch_add(1, Ordering::SeqCst);
                Ok(DownloadHandle::Stream(byte_stream(self.content(path)?)))
            }
        }
    }

    async fn open_url(&self, url: &str) -> AppResult<ByteStream> {
        let path = url
            .strip_prefix(REDIRECT_SCHEME)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown URL: {}", url)))?;
        Ok(byte_stream(self.content(path)?))
    }
}

/// Pipeline wired to `service`, real files under a temp directory.
pub struct TestBatch {
    pub pipeline: BatchCollectionDownloadPipeline,
    pub service: Arc<InMemoryDataManagement>,
    pub dir: TempDir,
}

impl TestBatch {
    pub async fn new(service: InMemoryDataManagement) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let sinks = BatchSinks::open(&dir.path().join("failed.txt"), &dir.path().join("errors.jsonl"))
            .await
            .expect("Failed to open batch sinks");
        let service = Arc::new(service);
        let pipeline = BatchCollectionDownloadPipeline::new(
            service.clone(),
            Arc::new(TokioFileSystem),
            Arc::new(sinks),
        );

        Self {
            pipeline,
            service,
            dir,
        }
    }

    pub fn output_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("out")
    }

    pub async fn read(&self, relative: &str) -> Option<Vec<u8>> {
        tokio::fs::read(self.output_dir().join(relative)).await.ok()
    }

    /// Every file below the output directory, relative to it, sorted.
    pub fn output_files(&self) -> Vec<String> {
        let root = self.output_dir();
        let mut files = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir).expect("output directory is readable") {
                let path = entry.expect("directory entry").path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let relative = path.strip_prefix(&root).expect("path below output root");
                    files.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        files.sort();
        files
    }

    pub async fn failed_records(&self) -> Vec<String> {
        read_lines(&self.dir.path().join("failed.txt")).await
    }

    pub async fn error_log(&self) -> Vec<serde_json::Value> {
        read_lines(&self.dir.path().join("errors.jsonl"))
            .await
            .iter()
            .map(|l| serde_json::from_str(l).expect("error log line is JSON"))
            .collect()
    }
}

async fn read_lines(path: &Path) -> Vec<String> {
    tokio::fs::read_to_string(path)
        .await
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}
