use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend_types::BackendType;
use crate::models::FileLocation;

/// Archive destination kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveType {
    Archive,
    TemporaryArchive,
}

impl FromStr for ArchiveType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ARCHIVE" => Ok(ArchiveType::Archive),
            "TEMPORARY_ARCHIVE" => Ok(ArchiveType::TemporaryArchive),
            _ => Err(anyhow::anyhow!("Invalid archive type: {}", s)),
        }
    }
}

impl Display for ArchiveType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ArchiveType::Archive => write!(f, "ARCHIVE"),
            ArchiveType::TemporaryArchive => write!(f, "TEMPORARY_ARCHIVE"),
        }
    }
}

/// Base archive destination handed to a proxy for one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveDestination {
    pub file_location: FileLocation,
    pub archive_type: ArchiveType,
}

/// Archive settings of one tenant for one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveConfig {
    pub id: String,
    pub backend_type: BackendType,
    pub base_archive_destination: FileLocation,
    /// `None` when the stored value was not a recognized archive type.
    pub archive_type: Option<ArchiveType>,
    pub local_directory: Option<String>,
}

impl ArchiveConfig {
    pub fn destination(&self) -> Option<ArchiveDestination> {
        self.archive_type.map(|archive_type| ArchiveDestination {
            file_location: self.base_archive_destination.clone(),
            archive_type,
        })
    }
}

/// Per-tenant configuration record as held by the configuration store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    pub id: String,
    pub tenant_code: String,
    pub base_path: String,
    pub archive_configs: HashMap<BackendType, ArchiveConfig>,
    /// Id of the object-storage archive config used for new uploads.
    pub upload_config_id: Option<String>,
    pub default_download_config_id: Option<String>,
}

impl TenantConfig {
    pub fn archive_config(&self, backend: BackendType) -> Option<&ArchiveConfig> {
        self.archive_configs.get(&backend)
    }
}
