//! Shared constants

/// Cumulative byte delta that triggers a `progressed` callback (100 MiB).
pub const DEFAULT_PROGRESS_REPORTING_RATE_BYTES: u64 = 1024 * 1024 * 100;

/// Suffix of the partial file a batch download writes before the final rename.
pub const PARTIAL_FILE_SUFFIX: &str = "_filepart";

pub const DEFAULT_BATCH_PARALLELISM: usize = 1;

/// Percent reported for every state bound for, or parked in, the temporary archive.
pub const TEMPORARY_ARCHIVE_PERCENT: u8 = 50;

/// Highest percent a still-streaming upload may report.
pub const MAX_STREAMING_PERCENT: u8 = 99;

pub const DEFAULT_PRESIGNED_URL_EXPIRATION_HOURS: u64 = 24;
