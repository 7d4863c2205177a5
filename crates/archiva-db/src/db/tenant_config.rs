//! Tenant configuration repository: reads tenant_configurations joined with
//! their archive_configurations.

use std::collections::HashMap;

use archiva_core::models::{ArchiveConfig, ArchiveType, FileLocation, TenantConfig};
use archiva_core::{AppError, AppResult, BackendType, TenantConfigStore};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

/// Row type for tenant_configurations table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TenantConfigRow {
    pub id: String,
    pub tenant_code: String,
    pub base_path: String,
    pub upload_config_id: Option<String>,
    pub default_download_config_id: Option<String>,
}

/// Row type for archive_configurations table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArchiveConfigRow {
    pub id: String,
    pub tenant_config_id: String,
    pub backend_type: String,
    pub container_id: String,
    pub file_id: String,
    pub archive_type: Option<String>,
    pub local_directory: Option<String>,
}

impl ArchiveConfigRow {
    /// `None` when the backend type is unknown. An unknown archive type is kept
    /// as `None` so the locator can reject the tenant as a whole.
    fn to_archive_config(&self) -> Option<ArchiveConfig> {
        let backend_type: BackendType = match self.backend_type.parse() {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(
                    archive_config_id = %self.id,
                    error = %e,
                    "Skipping archive configuration with unknown backend type"
                );
                return None;
            }
        };

        let archive_type = self.archive_type.as_deref().and_then(|value| {
            value
                .parse::<ArchiveType>()
                .map_err(|e| {
                    tracing::warn!(
                        archive_config_id = %self.id,
                        error = %e,
                        "Unrecognized archive type in archive configuration"
                    );
                })
                .ok()
        });

        Some(ArchiveConfig {
            id: self.id.clone(),
            backend_type,
            base_archive_destination: FileLocation::new(&self.container_id, &self.file_id),
            archive_type,
            local_directory: self.local_directory.clone(),
        })
    }
}

/// Group archive rows under their tenant rows.
///
/// When a tenant has several archive configurations for one backend, the one
/// referenced by `upload_config_id` wins; otherwise the first row is kept.
pub fn assemble_tenant_configs(
    tenants: Vec<TenantConfigRow>,
    archives: Vec<ArchiveConfigRow>,
) -> Vec<TenantConfig> {
    let mut by_tenant: HashMap<String, Vec<ArchiveConfigRow>> = HashMap::new();
    for archive in archives {
        by_tenant
            .entry(archive.tenant_config_id.clone())
            .or_default()
            .push(archive);
    }

    tenants
        .into_iter()
        .map(|tenant| {
            let mut archive_configs: HashMap<BackendType, ArchiveConfig> = HashMap::new();
            for row in by_tenant.remove(&tenant.id).unwrap_or_default() {
                let Some(config) = row.to_archive_config() else {
                    continue;
                };
                let preferred = tenant.upload_config_id.as_deref() == Some(config.id.as_str());
                if preferred || !archive_configs.contains_key(&config.backend_type) {
                    archive_configs.insert(config.backend_type, config);
                }
            }

            TenantConfig {
                id: tenant.id,
                tenant_code: tenant.tenant_code,
                base_path: tenant.base_path,
                archive_configs,
                upload_config_id: tenant.upload_config_id,
                default_download_config_id: tenant.default_download_config_id,
            }
        })
        .collect()
}

/// PostgreSQL-backed `TenantConfigStore`.
#[derive(Clone)]
pub struct TenantConfigRepository {
    pool: PgPool,
}

impl TenantConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "tenant_configurations"))]
    async fn fetch_tenants(&self) -> Result<Vec<TenantConfigRow>, AppError> {
        let rows = sqlx::query_as::<Postgres, TenantConfigRow>(
            r#"
            SELECT id, tenant_code, base_path, upload_config_id, default_download_config_id
            FROM tenant_configurations
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch tenant configurations");
            AppError::Database(e)
        })?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(db.table = "archive_configurations"))]
    async fn fetch_archives(&self) -> Result<Vec<ArchiveConfigRow>, AppError> {
        let rows = sqlx::query_as::<Postgres, ArchiveConfigRow>(
            r#"
            SELECT id, tenant_config_id, backend_type, container_id, file_id,
                   archive_type, local_directory
            FROM archive_configurations
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch archive configurations");
            AppError::Database(e)
        })?;
        Ok(rows)
    }
}

#[async_trait]
impl TenantConfigStore for TenantConfigRepository {
    async fn list_tenant_configs(&self) -> AppResult<Vec<TenantConfig>> {
        let tenants = self.fetch_tenants().await?;
        let archives = self.fetch_archives().await?;
        let configs = assemble_tenant_configs(tenants, archives);

        tracing::debug!(count = configs.len(), "Loaded tenant configurations");
        Ok(configs)
    }
}
