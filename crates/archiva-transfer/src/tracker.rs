//! In-process record of transfers run by this process
//!
//! Object storage and the cloud drives move bytes themselves, so their status
//! and byte-count queries are answered from here. Byte counters are shared
//! atomics so the streaming loop never takes the lock.
//!
//! Running transfers are kept until they settle. Settled ones (completed,
//! failed, or handed out as a pre-signed URL) live in a bounded LRU and the
//! oldest are evicted once the retention is reached.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use archiva_core::models::{
    ArchiveType, DownloadStatus, DownloadStatusReport, FileLocation, UploadStatus,
    UploadStatusReport,
};
use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::RwLock;

use crate::traits::{TransferError, TransferResult};

/// Settled transfers kept when no retention is configured.
pub const DEFAULT_TRACKER_RETENTION: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedState {
    InProgress,
    /// A pre-signed upload URL was issued; the caller moves the bytes.
    AwaitingExternalUpload,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Upload(ArchiveType),
    Download,
}

struct TrackedTransfer {
    direction: TransferDirection,
    state: TrackedState,
    bytes: Arc<AtomicU64>,
    total_size: Option<u64>,
    location: Option<FileLocation>,
    message: Option<String>,
    started_at: DateTime<Utc>,
}

/// Point-in-time copy of a tracked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSnapshot {
    pub direction: TransferDirection,
    pub state: TrackedState,
    pub bytes_transferred: u64,
    pub total_size: Option<u64>,
    pub location: Option<FileLocation>,
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl TransferSnapshot {
    pub fn upload_report(&self) -> UploadStatusReport {
        let status = match (self.direction, self.state) {
            (_, TrackedState::Failed) => UploadStatus::Failed,
            (_, TrackedState::AwaitingExternalUpload) => UploadStatus::UrlGenerated,
            (TransferDirection::Upload(archive_type), TrackedState::Completed) => {
                UploadStatus::arrived_in(archive_type)
            }
            (_, TrackedState::Completed) => UploadStatus::Archived,
            (_, TrackedState::InProgress) => UploadStatus::StreamingInProgress,
        };
        UploadStatusReport {
            status,
            bytes_transferred: self.bytes_transferred,
            message: self.message.clone(),
        }
    }

    pub fn download_report(&self) -> DownloadStatusReport {
        let status = match self.state {
            TrackedState::Completed => DownloadStatus::Completed,
            TrackedState::Failed => DownloadStatus::Failed,
            TrackedState::InProgress | TrackedState::AwaitingExternalUpload => {
                DownloadStatus::InProgress
            }
        };
        DownloadStatusReport {
            status,
            bytes_transferred: self.bytes_transferred,
            message: self.message.clone(),
        }
    }
}

struct Transfers {
    active: HashMap<String, TrackedTransfer>,
    settled: LruCache<String, TrackedTransfer>,
}

impl Transfers {
    fn get(&self, request_id: &str) -> Option<&TrackedTransfer> {
        self.active
            .get(request_id)
            .or_else(|| self.settled.peek(request_id))
    }

    /// Apply `update` and move the entry into the settled cache.
    fn settle(&mut self, request_id: &str, update: impl FnOnce(&mut TrackedTransfer)) {
        let entry = self
            .active
            .remove(request_id)
            .or_else(|| self.settled.pop(request_id));
        if let Some(mut entry) = entry {
            update(&mut entry);
            self.settled.put(request_id.to_string(), entry);
        }
    }
}

#[derive(Clone)]
pub struct TransferTracker {
    transfers: Arc<RwLock<Transfers>>,
}

impl Default for TransferTracker {
    fn default() -> Self {
        Self::with_retention(DEFAULT_TRACKER_RETENTION)
    }
}

impl TransferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retention` settled transfers; running ones are never evicted.
    pub fn with_retention(retention: usize) -> Self {
        let capacity = NonZeroUsize::new(retention).unwrap_or(NonZeroUsize::MIN);
        Self {
            transfers: Arc::new(RwLock::new(Transfers {
                active: HashMap::new(),
                settled: LruCache::new(capacity),
            })),
        }
    }

    /// Start tracking a transfer; returns the byte counter to advance.
    pub async fn register(
        &self,
        request_id: &str,
        direction: TransferDirection,
        total_size: Option<u64>,
        location: Option<FileLocation>,
    ) -> Arc<AtomicU64> {
        self.insert(request_id, direction, TrackedState::InProgress, total_size, location)
            .await
    }

    /// Track an upload whose bytes arrive through a pre-signed URL.
    pub async fn register_external_upload(
        &self,
        request_id: &str,
        archive_type: ArchiveType,
        location: FileLocation,
    ) {
        self.insert(
            request_id,
            TransferDirection::Upload(archive_type),
            TrackedState::AwaitingExternalUpload,
            None,
            Some(location),
        )
        .await;
    }

    async fn insert(
        &self,
        request_id: &str,
        direction: TransferDirection,
        state: TrackedState,
        total_size: Option<u64>,
        location: Option<FileLocation>,
    ) -> Arc<AtomicU64> {
        let bytes = Arc::new(AtomicU64::new(0));
        let entry = TrackedTransfer {
            direction,
            state,
            bytes: bytes.clone(),
            total_size,
            location,
            message: None,
            started_at: Utc::now(),
        };

        let mut transfers = self.transfers.write().await;
        transfers.active.remove(request_id);
        transfers.settled.pop(request_id);
        if state == TrackedState::InProgress {
            transfers.active.insert(request_id.to_string(), entry);
        } else {
            transfers.settled.put(request_id.to_string(), entry);
        }
        bytes
    }

    /// Mark a transfer completed, optionally fixing its final byte count.
    pub async fn complete(&self, request_id: &str, final_size: Option<u64>) {
        self.transfers.write().await.settle(request_id, |entry| {
            if let Some(size) = final_size {
                entry.bytes.store(size, Ordering::SeqCst);
            }
            entry.state = TrackedState::Completed;
        });
    }

    pub async fn fail(&self, request_id: &str, message: &str) {
        self.transfers.write().await.settle(request_id, |entry| {
            entry.state = TrackedState::Failed;
            entry.message = Some(message.to_string());
        });
    }

    pub async fn snapshot(&self, request_id: &str) -> Option<TransferSnapshot> {
        let transfers = self.transfers.read().await;
        transfers.get(request_id).map(|entry| TransferSnapshot {
            direction: entry.direction,
            state: entry.state,
            bytes_transferred: entry.bytes.load(Ordering::SeqCst),
            total_size: entry.total_size,
            location: entry.location.clone(),
            message: entry.message.clone(),
            started_at: entry.started_at,
        })
    }

    /// Like [`snapshot`](Self::snapshot), failing with `NotFound` for unknown ids.
    pub async fn require(&self, request_id: &str) -> TransferResult<TransferSnapshot> {
        self.snapshot(request_id)
            .await
            .ok_or_else(|| TransferError::NotFound(format!("transfer request {}", request_id)))
    }

    pub async fn len(&self) -> usize {
        let transfers = self.transfers.read().await;
        transfers.active.len() + transfers.settled.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
