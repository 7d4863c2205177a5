use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{ArchiveType, FileLocation};

/// Upload lifecycle of a data object.
///
/// `Received → InProgressToTemporaryArchive → InTemporaryArchive →
/// InProgressToArchive → Archived`, with `Failed` reachable from every
/// non-terminal state. `StreamingInProgress` and `UrlGenerated` are entered
/// straight from `Received` when this process streams the bytes itself or
/// hands out a pre-signed upload URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Received,
    InProgressToTemporaryArchive,
    InTemporaryArchive,
    InProgressToArchive,
    Archived,
    StreamingInProgress,
    UrlGenerated,
    Failed,
}

impl UploadStatus {
    fn rank(&self) -> Option<u8> {
        match self {
            UploadStatus::Received => Some(0),
            UploadStatus::InProgressToTemporaryArchive
            | UploadStatus::StreamingInProgress
            | UploadStatus::UrlGenerated => Some(1),
            UploadStatus::InTemporaryArchive => Some(2),
            UploadStatus::InProgressToArchive => Some(3),
            UploadStatus::Archived => Some(4),
            UploadStatus::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Archived | UploadStatus::Failed)
    }

    /// Whether `next` is a legal successor. Statuses only move forward.
    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(candidate)) => candidate > current,
            (None, Some(_)) => false,
        }
    }

    /// In-progress status for a transfer bound for the given archive type.
    pub fn in_progress_to(archive_type: ArchiveType) -> Self {
        match archive_type {
            ArchiveType::Archive => UploadStatus::InProgressToArchive,
            ArchiveType::TemporaryArchive => {
                UploadStatus::InProgressToTemporaryArchive
            }
        }
    }

    /// Settled status once the bytes reached the given archive type.
    pub fn arrived_in(archive_type: ArchiveType) -> Self {
        match archive_type {
            ArchiveType::Archive => UploadStatus::Archived,
            ArchiveType::TemporaryArchive => UploadStatus::InTemporaryArchive,
        }
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RECEIVED" => Ok(UploadStatus::Received),
            "IN_PROGRESS_TO_TEMPORARY_ARCHIVE" => Ok(UploadStatus::InProgressToTemporaryArchive),
            "IN_TEMPORARY_ARCHIVE" => Ok(UploadStatus::InTemporaryArchive),
            "IN_PROGRESS_TO_ARCHIVE" => Ok(UploadStatus::InProgressToArchive),
            "ARCHIVED" => Ok(UploadStatus::Archived),
            "STREAMING_IN_PROGRESS" => Ok(UploadStatus::StreamingInProgress),
            "URL_GENERATED" => Ok(UploadStatus::UrlGenerated),
            "FAILED" => Ok(UploadStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            UploadStatus::Received => "RECEIVED",
            UploadStatus::InProgressToTemporaryArchive => "IN_PROGRESS_TO_TEMPORARY_ARCHIVE",
            UploadStatus::InTemporaryArchive => "IN_TEMPORARY_ARCHIVE",
            UploadStatus::InProgressToArchive => "IN_PROGRESS_TO_ARCHIVE",
            UploadStatus::Archived => "ARCHIVED",
            UploadStatus::StreamingInProgress => "STREAMING_IN_PROGRESS",
            UploadStatus::UrlGenerated => "URL_GENERATED",
            UploadStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    InProgress,
    Completed,
    Failed,
}

impl Display for DownloadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DownloadStatus::InProgress => write!(f, "IN_PROGRESS"),
            DownloadStatus::Completed => write!(f, "COMPLETED"),
            DownloadStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Where the bytes of an upload come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// A file readable by this process.
    File(PathBuf),
    /// A location on the backend's own network (grid endpoint and path).
    Location(FileLocation),
    /// Nothing to move yet: hand the caller a pre-signed upload URL.
    GenerateUploadUrl { expiration: Duration },
    /// Stream from a readable URL, such as a pre-signed URL of another bucket.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Logical path of the data object, e.g. `/Tenant/project/file.dat`.
    pub path: String,
    pub caller_namespace: Option<String>,
    pub source: UploadSource,
    pub size: Option<u64>,
    /// Append a random suffix to the permanent archive name.
    pub unique: bool,
}

/// Where the bytes of a download go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadDestination {
    File(PathBuf),
    Location(FileLocation),
    /// A folder of a cloud drive. `folder_id` of `None` means the drive root.
    Drive {
        folder_id: Option<String>,
        file_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub path: String,
    pub archive_location: FileLocation,
    /// Pre-signed URL of the archived object, required by the cloud drives.
    pub source_url: Option<String>,
    pub destination: DownloadDestination,
    pub size: Option<u64>,
}

/// Name/value pair attached to an archived object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub attribute: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub archive_location: FileLocation,
    pub request_id: String,
    pub status: UploadStatus,
    pub upload_url: Option<String>,
    pub source_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusReport {
    pub status: UploadStatus,
    pub bytes_transferred: u64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStatusReport {
    pub status: DownloadStatus,
    pub bytes_transferred: u64,
    pub message: Option<String>,
}

/// Credentials of the service account used against one backend.
///
/// `properties` carries backend-specific settings such as region or endpoint.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IntegratedSystemAccount {
    pub username: String,
    pub password: String,
    pub properties: HashMap<String, String>,
}

impl IntegratedSystemAccount {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for IntegratedSystemAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegratedSystemAccount")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("properties", &self.properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_status_moves_forward_only() {
        assert!(UploadStatus::Received.can_transition_to(UploadStatus::InProgressToTemporaryArchive));
        assert!(UploadStatus::InTemporaryArchive.can_transition_to(UploadStatus::InProgressToArchive));
        assert!(UploadStatus::InProgressToArchive.can_transition_to(UploadStatus::Archived));
        assert!(!UploadStatus::InProgressToArchive.can_transition_to(UploadStatus::InTemporaryArchive));
        assert!(!UploadStatus::Archived.can_transition_to(UploadStatus::Failed));
        assert!(!UploadStatus::Failed.can_transition_to(UploadStatus::Received));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        for status in [
            UploadStatus::Received,
            UploadStatus::InProgressToTemporaryArchive,
            UploadStatus::InTemporaryArchive,
            UploadStatus::InProgressToArchive,
            UploadStatus::StreamingInProgress,
            UploadStatus::UrlGenerated,
        ] {
            assert!(status.can_transition_to(UploadStatus::Failed), "{}", status);
        }
    }

    #[test]
    fn test_upload_status_string_form() {
        assert_eq!(
            UploadStatus::InProgressToTemporaryArchive.to_string(),
            "IN_PROGRESS_TO_TEMPORARY_ARCHIVE"
        );
        assert_eq!(
            "archived".parse::<UploadStatus>().unwrap(),
            UploadStatus::Archived
        );
        assert!("done".parse::<UploadStatus>().is_err());
    }

    #[test]
    fn test_status_for_archive_type() {
        assert_eq!(
            UploadStatus::arrived_in(ArchiveType::TemporaryArchive),
            UploadStatus::InTemporaryArchive
        );
        assert_eq!(
            UploadStatus::in_progress_to(ArchiveType::Archive),
            UploadStatus::InProgressToArchive
        );
    }

    #[test]
    fn test_account_debug_redacts_password() {
        let account = IntegratedSystemAccount::new("svc", "s3cret");
        let rendered = format!("{:?}", account);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("svc"));
    }
}
