use serde::{Deserialize, Serialize};

/// Backend-specific address of a file or directory.
///
/// Object storage reads `container_id` as the bucket and `file_id` as the key;
/// grid transfer reads them as endpoint and path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLocation {
    pub container_id: String,
    pub file_id: String,
}

impl FileLocation {
    pub fn new(container_id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            file_id: file_id.into(),
        }
    }
}

impl std::fmt::Display for FileLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.container_id, self.file_id)
    }
}

/// What a backend knows about a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathAttributes {
    pub exists: bool,
    pub is_file: bool,
    pub is_directory: bool,
    pub is_accessible: bool,
    /// Only populated for files when the caller asked for it.
    pub size: Option<u64>,
}

impl PathAttributes {
    pub fn missing() -> Self {
        Self {
            is_accessible: true,
            ..Self::default()
        }
    }

    pub fn file(size: Option<u64>) -> Self {
        Self {
            exists: true,
            is_file: true,
            is_directory: false,
            is_accessible: true,
            size,
        }
    }

    pub fn directory() -> Self {
        Self {
            exists: true,
            is_file: false,
            is_directory: true,
            is_accessible: true,
            size: None,
        }
    }

    pub fn inaccessible() -> Self {
        Self::default()
    }
}

/// One file found while scanning a backend directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryScanItem {
    pub file_path: String,
    pub size: u64,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}
