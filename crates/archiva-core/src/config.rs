//! Configuration module
//!
//! Settings are read from the environment (a `.env` file is honored) with a
//! default for every optional value. Call `validate()` before wiring anything.

use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_PRESIGNED_URL_EXPIRATION_HOURS, DEFAULT_PROGRESS_REPORTING_RATE_BYTES};

const HTTP_TIMEOUT_SECS: u64 = 60;
const GRID_MAX_ACTIVE_TASKS: usize = 100;
const TRACKER_RETENTION: usize = 10_000;
const GRID_TRANSFER_API_URL: &str = "https://transfer.api.globusonline.org/v0.10";
const GRID_AUTH_URL: &str = "https://auth.globus.org";
const GOOGLE_DRIVE_API_URL: &str = "https://www.googleapis.com";
const BOX_API_URL: &str = "https://api.box.com";
const BOX_UPLOAD_URL: &str = "https://upload.box.com/api";
const FAILED_RECORDS_FILE: &str = "logs/failed-records.txt";
const ERROR_LOG_FILE: &str = "logs/batch-errors.jsonl";

/// Settings shared by the transfer proxies.
#[derive(Clone, Debug)]
pub struct TransferSettings {
    /// Cumulative byte delta between two `progressed` callbacks.
    pub progress_reporting_rate_bytes: u64,
    pub http_timeout_secs: u64,
    pub grid_transfer_api_url: String,
    pub grid_auth_url: String,
    /// The grid proxy stops accepting requests at this many active tasks.
    pub grid_max_active_tasks: usize,
    pub google_drive_api_url: String,
    pub box_api_url: String,
    pub box_upload_url: String,
    /// Region used when an object-storage account does not name one.
    pub s3_default_region: String,
    pub presigned_url_expiration_hours: u64,
    /// Finished transfers kept queryable before the oldest are evicted.
    pub tracker_retention: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            progress_reporting_rate_bytes: DEFAULT_PROGRESS_REPORTING_RATE_BYTES,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            grid_transfer_api_url: GRID_TRANSFER_API_URL.to_string(),
            grid_auth_url: GRID_AUTH_URL.to_string(),
            grid_max_active_tasks: GRID_MAX_ACTIVE_TASKS,
            google_drive_api_url: GOOGLE_DRIVE_API_URL.to_string(),
            box_api_url: BOX_API_URL.to_string(),
            box_upload_url: BOX_UPLOAD_URL.to_string(),
            s3_default_region: "us-east-1".to_string(),
            presigned_url_expiration_hours: DEFAULT_PRESIGNED_URL_EXPIRATION_HOURS,
            tracker_retention: TRACKER_RETENTION,
        }
    }
}

impl TransferSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            progress_reporting_rate_bytes: env::var("TRANSFER_PROGRESS_REPORTING_RATE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.progress_reporting_rate_bytes),
            http_timeout_secs: env::var("TRANSFER_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            grid_transfer_api_url: env::var("GRID_TRANSFER_API_URL")
                .unwrap_or(defaults.grid_transfer_api_url),
            grid_auth_url: env::var("GRID_AUTH_URL").unwrap_or(defaults.grid_auth_url),
            grid_max_active_tasks: env::var("GRID_MAX_ACTIVE_TASKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.grid_max_active_tasks),
            google_drive_api_url: env::var("GOOGLE_DRIVE_API_URL")
                .unwrap_or(defaults.google_drive_api_url),
            box_api_url: env::var("BOX_API_URL").unwrap_or(defaults.box_api_url),
            box_upload_url: env::var("BOX_UPLOAD_URL").unwrap_or(defaults.box_upload_url),
            s3_default_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or(defaults.s3_default_region),
            presigned_url_expiration_hours: env::var("PRESIGNED_URL_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.presigned_url_expiration_hours),
            tracker_retention: env::var("TRANSFER_TRACKER_RETENTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tracker_retention),
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.progress_reporting_rate_bytes == 0 {
            return Err(anyhow::anyhow!(
                "TRANSFER_PROGRESS_REPORTING_RATE_BYTES must be greater than zero"
            ));
        }
        if self.tracker_retention == 0 {
            return Err(anyhow::anyhow!(
                "TRANSFER_TRACKER_RETENTION must be greater than zero"
            ));
        }

        for (name, url) in [
            ("GRID_TRANSFER_API_URL", &self.grid_transfer_api_url),
            ("GRID_AUTH_URL", &self.grid_auth_url),
            ("GOOGLE_DRIVE_API_URL", &self.google_drive_api_url),
            ("BOX_API_URL", &self.box_api_url),
            ("BOX_UPLOAD_URL", &self.box_upload_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!("{} must be an http(s) URL, got {}", name, url));
            }
        }

        Ok(())
    }
}

/// Settings of the batch collection download pipeline.
#[derive(Clone, Debug)]
pub struct BatchDownloadSettings {
    pub data_management_url: String,
    pub data_management_token: Option<String>,
    /// Raw worker count; parsed when a batch starts so a bad value aborts it.
    pub threads: Option<String>,
    pub failed_records_file: PathBuf,
    pub error_log_file: PathBuf,
    pub api_timeout_secs: u64,
}

impl BatchDownloadSettings {
    pub fn from_env() -> Self {
        Self {
            data_management_url: env::var("DATA_MANAGEMENT_URL")
                .unwrap_or_else(|_| "http://localhost:7738/api".to_string()),
            data_management_token: env::var("DATA_MANAGEMENT_TOKEN").ok(),
            threads: env::var("BATCH_DOWNLOAD_THREADS").ok(),
            failed_records_file: env::var("BATCH_FAILED_RECORDS_FILE")
                .unwrap_or_else(|_| FAILED_RECORDS_FILE.to_string())
                .into(),
            error_log_file: env::var("BATCH_ERROR_LOG_FILE")
                .unwrap_or_else(|_| ERROR_LOG_FILE.to_string())
                .into(),
            api_timeout_secs: env::var("DATA_MANAGEMENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(HTTP_TIMEOUT_SECS),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// Connection string of the tenant configuration store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub transfer: TransferSettings,
    pub batch: BatchDownloadSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_CONNECTIONS: u32 = 5;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .unwrap_or(MAX_CONNECTIONS);

        let config = Config {
            environment,
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections,
            transfer: TransferSettings::from_env(),
            batch: BatchDownloadSettings::from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(ref url) = self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        } else if self.is_production() {
            return Err(anyhow::anyhow!("DATABASE_URL must be set in production"));
        }

        self.transfer.validate()
    }
}
