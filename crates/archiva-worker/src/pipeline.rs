//! Batch pipeline: listing, dispatch and worker pool.
//!
//! Listing happens up front and a listing failure aborts the batch before any
//! download starts. Downloads then run on `threads` workers, each draining its
//! own queue until it reads the `Shutdown` sentinel.

use std::path::PathBuf;
use std::sync::Arc;

use archiva_core::constants::DEFAULT_BATCH_PARALLELISM;
use archiva_core::models::{BatchReport, DataObjectDescriptor, WorkerReport};
use archiva_core::{AppError, AppResult, DataManagementService};
use chrono::Utc;
use tokio::sync::mpsc;

use crate::fs::LocalFileSystem;
use crate::sinks::BatchSinks;
use crate::task::{parent_path, DownloadTask, TaskContext, WorkItem};

/// Capacity of each worker queue.
const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDownloadRequest {
    /// Logical path of the collection to download.
    pub source_collection: String,
    pub destination_dir: PathBuf,
    /// Raw worker count; absent or blank means one worker.
    pub threads: Option<String>,
}

/// Worker count from its raw setting.
pub fn parse_thread_count(raw: Option<&str>) -> AppResult<usize> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DEFAULT_BATCH_PARALLELISM);
    };
    match raw.parse::<usize>() {
        Ok(0) | Err(_) => Err(AppError::InvalidInput(format!(
            "Invalid thread count: {}. Expected a positive integer.",
            raw
        ))),
        Ok(n) => Ok(n),
    }
}

pub struct BatchCollectionDownloadPipeline {
    service: Arc<dyn DataManagementService>,
    fs: Arc<dyn LocalFileSystem>,
    sinks: Arc<BatchSinks>,
}

impl BatchCollectionDownloadPipeline {
    pub fn new(
        service: Arc<dyn DataManagementService>,
        fs: Arc<dyn LocalFileSystem>,
        sinks: Arc<BatchSinks>,
    ) -> Self {
        Self { service, fs, sinks }
    }

    /// Every data object below `collection`, depth first.
    #[tracing::instrument(skip(self))]
    pub async fn collect_data_objects(
        &self,
        collection: &str,
    ) -> AppResult<Vec<DataObjectDescriptor>> {
        let mut objects = Vec::new();
        let mut pending = vec![collection.to_string()];

        while let Some(path) = pending.pop() {
            let listing = self.service.list_collection(&path).await?;
            objects.extend(listing.data_objects);
            pending.extend(listing.sub_collections.into_iter().rev());
        }

        Ok(objects)
    }

    /// Download the whole collection and merge the per-worker outcomes.
    #[tracing::instrument(skip(self, request), fields(source = %request.source_collection))]
    pub async fn run(&self, request: &BatchDownloadRequest) -> AppResult<BatchReport> {
        let started_at = Utc::now();
        let threads = parse_thread_count(request.threads.as_deref())?;

        let objects = self
            .collect_data_objects(&request.source_collection)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    source = %request.source_collection,
                    "Failed to list collection"
                );
                e
            })?;

        tracing::info!(
            data_objects = objects.len(),
            threads,
            destination = %request.destination_dir.display(),
            "Starting batch download"
        );
        if objects.is_empty() {
            return Ok(BatchReport::empty(started_at));
        }

        let context = Arc::new(TaskContext {
            service: self.service.clone(),
            fs: self.fs.clone(),
            sinks: self.sinks.clone(),
            destination_dir: request.destination_dir.clone(),
            source_parent: parent_path(&request.source_collection),
        });

        let mut senders = Vec::with_capacity(threads);
        let mut workers = Vec::with_capacity(threads);
        for worker_index in 0..threads {
            let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
            senders.push(tx);
            workers.push(tokio::spawn(run_worker(worker_index, rx)));
        }

        let dispatcher = tokio::spawn(dispatch(objects, context, senders));

        if let Err(e) = dispatcher.await {
            tracing::error!(error = %e, "Batch dispatcher panicked");
        }

        let mut reports = Vec::with_capacity(threads);
        for (worker_index, worker) in workers.into_iter().enumerate() {
            match worker.await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(
                    error = %e,
                    worker_index,
                    "Batch worker panicked; its remaining tasks are not counted"
                ),
            }
        }

        let report = BatchReport::merge(started_at, reports, Utc::now());
        tracing::info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = (report.completed_at - report.started_at).num_milliseconds(),
            "Batch download finished"
        );
        Ok(report)
    }
}

/// Hand out tasks round-robin, then one sentinel per queue.
async fn dispatch(
    objects: Vec<DataObjectDescriptor>,
    context: Arc<TaskContext>,
    senders: Vec<mpsc::Sender<WorkItem>>,
) {
    for (index, descriptor) in objects.into_iter().enumerate() {
        let worker_index = index % senders.len();
        let path = descriptor.path.clone();
        let task = DownloadTask::new(descriptor, context.clone());
        if senders[worker_index].send(WorkItem::Task(task)).await.is_err() {
            tracing::warn!(worker_index, path = %path, "Worker queue closed, task dropped");
        }
    }

    for sender in &senders {
        let _ = sender.send(WorkItem::Shutdown).await;
    }
}

async fn run_worker(worker_index: usize, mut queue: mpsc::Receiver<WorkItem>) -> WorkerReport {
    let mut report = WorkerReport::new(worker_index);

    while let Some(item) = queue.recv().await {
        match item {
            WorkItem::Task(task) => report.record(task.run().await),
            WorkItem::Shutdown => break,
        }
    }

    tracing::debug!(
        worker_index,
        processed = report.records.len(),
        "Batch worker finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_count_defaults_to_one() {
        assert_eq!(parse_thread_count(None).unwrap(), 1);
        assert_eq!(parse_thread_count(Some("  ")).unwrap(), 1);
    }

    #[test]
    fn test_thread_count_parses_positive() {
        assert_eq!(parse_thread_count(Some("4")).unwrap(), 4);
        assert_eq!(parse_thread_count(Some(" 8 ")).unwrap(), 8);
    }

    #[test]
    fn test_thread_count_rejects_invalid() {
        assert!(matches!(
            parse_thread_count(Some("four")),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_thread_count(Some("0")),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_thread_count(Some("-2")),
            Err(AppError::InvalidInput(_))
        ));
    }
}
