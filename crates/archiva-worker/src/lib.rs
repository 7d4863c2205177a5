//! Batch collection download pipeline.
//!
//! One dispatcher feeds N workers through per-worker FIFO queues. Every
//! worker downloads its data objects into a local directory tree and records
//! one outcome per object; a `Shutdown` sentinel on each queue ends the batch.
//! Individual failures go to the failed-records file and the error log and
//! never stop sibling downloads.

pub mod fs;
pub mod pipeline;
pub mod sinks;
pub mod task;

pub use fs::{LocalFileSystem, TokioFileSystem};
pub use pipeline::{parse_thread_count, BatchCollectionDownloadPipeline, BatchDownloadRequest};
pub use sinks::{BatchSinks, ErrorLogEntry};
pub use task::{DownloadTask, TaskContext, WorkItem};
