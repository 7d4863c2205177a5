//! Upload progress estimation
//!
//! Maps an upload's status, backend and byte counts to a percent-complete
//! value. Backends that cannot report exact byte counts only ever get the
//! coarse per-state estimate.

use crate::backend_types::BackendType;
use crate::constants::{MAX_STREAMING_PERCENT, TEMPORARY_ARCHIVE_PERCENT};
use crate::models::UploadStatus;

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadProgressCalculator;

impl UploadProgressCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Percent complete in `0..=100`, or `None` when progress is not
    /// meaningful (unknown status or backend, failed upload, missing counts).
    pub fn percent_complete(
        &self,
        status: Option<UploadStatus>,
        backend: Option<BackendType>,
        bytes_transferred: Option<u64>,
        total_size: Option<u64>,
    ) -> Option<u8> {
        let status = status?;
        let backend = backend?;

        match status {
            UploadStatus::Received | UploadStatus::UrlGenerated => Some(0),
            UploadStatus::InProgressToTemporaryArchive
            | UploadStatus::InTemporaryArchive
            | UploadStatus::InProgressToArchive => Some(TEMPORARY_ARCHIVE_PERCENT),
            UploadStatus::Archived => Some(100),
            UploadStatus::Failed => None,
            UploadStatus::StreamingInProgress => {
                if !backend.reports_exact_byte_counts() {
                    return None;
                }
                streaming_percent(bytes_transferred?, total_size?)
            }
        }
    }
}

fn streaming_percent(bytes_transferred: u64, total_size: u64) -> Option<u8> {
    if total_size == 0 {
        return None;
    }
    let ratio = (bytes_transferred as u128 * 100) / total_size as u128;
    // Still streaming, so never claim completion.
    Some(ratio.min(MAX_STREAMING_PERCENT as u128) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc() -> UploadProgressCalculator {
        UploadProgressCalculator::new()
    }

    #[test]
    fn test_streaming_object_storage_uses_byte_ratio() {
        let percent = calc().percent_complete(
            Some(UploadStatus::StreamingInProgress),
            Some(BackendType::ObjectStorage),
            Some(2000),
            Some(5000),
        );
        assert_eq!(percent, Some(40));
    }

    #[test]
    fn test_streaming_ratio_is_floored_and_capped() {
        let c = calc();
        let status = Some(UploadStatus::StreamingInProgress);
        let backend = Some(BackendType::Box);
        assert_eq!(c.percent_complete(status, backend, Some(1), Some(3)), Some(33));
        assert_eq!(c.percent_complete(status, backend, Some(5000), Some(5000)), Some(99));
        assert_eq!(c.percent_complete(status, backend, Some(9000), Some(5000)), Some(99));
        assert_eq!(c.percent_complete(status, backend, Some(0), Some(5000)), Some(0));
    }

    #[test]
    fn test_streaming_without_counts_is_unknown() {
        let c = calc();
        let status = Some(UploadStatus::StreamingInProgress);
        let backend = Some(BackendType::ObjectStorage);
        assert_eq!(c.percent_complete(status, backend, None, Some(10)), None);
        assert_eq!(c.percent_complete(status, backend, Some(5), None), None);
        assert_eq!(c.percent_complete(status, backend, Some(5), Some(0)), None);
    }

    #[test]
    fn test_grid_transfer_never_uses_byte_ratio() {
        let percent = calc().percent_complete(
            Some(UploadStatus::StreamingInProgress),
            Some(BackendType::GridTransfer),
            Some(2000),
            Some(5000),
        );
        assert_eq!(percent, None);
    }

    #[test]
    fn test_per_state_values() {
        let c = calc();
        let backend = Some(BackendType::GridTransfer);
        let at = |status| c.percent_complete(Some(status), backend, Some(1), Some(2));

        assert_eq!(at(UploadStatus::Received), Some(0));
        assert_eq!(at(UploadStatus::InProgressToTemporaryArchive), Some(50));
        assert_eq!(at(UploadStatus::InTemporaryArchive), Some(50));
        assert_eq!(at(UploadStatus::InProgressToArchive), Some(50));
        assert_eq!(at(UploadStatus::Archived), Some(100));
        assert_eq!(at(UploadStatus::UrlGenerated), Some(0));
        assert_eq!(at(UploadStatus::Failed), None);
    }

    #[test]
    fn test_missing_status_or_backend() {
        let c = calc();
        assert_eq!(
            c.percent_complete(None, Some(BackendType::ObjectStorage), Some(1), Some(2)),
            None
        );
        assert_eq!(
            c.percent_complete(Some(UploadStatus::Archived), None, Some(1), Some(2)),
            None
        );
    }

    #[test]
    fn test_result_always_in_range() {
        let c = calc();
        for backend in BackendType::ALL {
            for bytes in [0u64, 1, 49, 50, 99, 100, 150, u64::MAX] {
                if let Some(p) = c.percent_complete(
                    Some(UploadStatus::StreamingInProgress),
                    Some(backend),
                    Some(bytes),
                    Some(100),
                ) {
                    assert!(p <= 100);
                }
            }
        }
    }
}
