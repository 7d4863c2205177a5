use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of downloading one data object in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcomeRecord {
    pub path: String,
    pub succeeded: bool,
    pub failure_detail: Option<String>,
}

impl BatchOutcomeRecord {
    pub fn success(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            succeeded: true,
            failure_detail: None,
        }
    }

    pub fn failure(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            succeeded: false,
            failure_detail: Some(detail.into()),
        }
    }
}

/// Outcomes recorded by a single batch worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_index: usize,
    pub records: Vec<BatchOutcomeRecord>,
}

impl WorkerReport {
    pub fn new(worker_index: usize) -> Self {
        Self {
            worker_index,
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: BatchOutcomeRecord) {
        self.records.push(outcome);
    }
}

/// Merged outcome of a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub records: Vec<BatchOutcomeRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            records: Vec::new(),
            started_at,
            completed_at: started_at,
        }
    }

    /// Merge worker reports in worker order.
    pub fn merge(
        started_at: DateTime<Utc>,
        mut workers: Vec<WorkerReport>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        workers.sort_by_key(|w| w.worker_index);
        let records: Vec<BatchOutcomeRecord> =
            workers.into_iter().flat_map(|w| w.records).collect();
        let succeeded = records.iter().filter(|r| r.succeeded).count();

        Self {
            total: records.len(),
            succeeded,
            failed: records.len() - succeeded,
            records,
            started_at,
            completed_at,
        }
    }

    pub fn failed_paths(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|r| !r.succeeded)
            .map(|r| r.path.as_str())
    }
}
