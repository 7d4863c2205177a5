use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend types
///
/// Defined in core because configuration records, the proxy registry and the
/// progress calculator all key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "backend_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    GridTransfer,
    ObjectStorage,
    GoogleDrive,
    Box,
}

impl BackendType {
    pub const ALL: [BackendType; 4] = [
        BackendType::GridTransfer,
        BackendType::ObjectStorage,
        BackendType::GoogleDrive,
        BackendType::Box,
    ];

    /// Whether the backend can report exact transferred byte counts while a
    /// transfer is running.
    pub fn reports_exact_byte_counts(&self) -> bool {
        match self {
            BackendType::ObjectStorage | BackendType::GoogleDrive | BackendType::Box => true,
            BackendType::GridTransfer => false,
        }
    }

    /// Asynchronous backends return from `download` before any byte moved.
    pub fn is_asynchronous(&self) -> bool {
        matches!(self, BackendType::GoogleDrive | BackendType::Box)
    }
}

impl FromStr for BackendType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grid_transfer" | "globus" => Ok(BackendType::GridTransfer),
            "object_storage" | "s3" => Ok(BackendType::ObjectStorage),
            "google_drive" => Ok(BackendType::GoogleDrive),
            "box" => Ok(BackendType::Box),
            _ => Err(anyhow::anyhow!("Invalid backend type: {}", s)),
        }
    }
}

impl Display for BackendType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BackendType::GridTransfer => write!(f, "grid_transfer"),
            BackendType::ObjectStorage => write!(f, "object_storage"),
            BackendType::GoogleDrive => write!(f, "google_drive"),
            BackendType::Box => write!(f, "box"),
        }
    }
}
