//! Tenant configuration locator.
//!
//! Holds an immutable index of every tenant configuration. `reload()` builds a
//! complete new index from the store and swaps it in one step; readers clone
//! the current `Arc<LocatorSnapshot>` and never see a half-built index. A
//! reload that fails validation leaves the active snapshot untouched. Until
//! the first successful reload every lookup fails with `NotFound`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use archiva_core::models::{ArchiveConfig, TenantConfig};
use archiva_core::{AppError, AppResult, BackendType, TenantConfigStore};
use regex::Regex;
use tokio::sync::RwLock;

/// A base path is exactly one segment below the root.
const BASE_PATH_PATTERN: &str = r"^/[^/]+$";

/// One validated, fully indexed view of the tenant configurations.
#[derive(Debug, Default)]
pub struct LocatorSnapshot {
    configs: HashMap<String, Arc<TenantConfig>>,
    tenant_codes: HashMap<String, String>,
    base_paths: HashMap<String, String>,
    backends: HashMap<String, BackendType>,
}

impl LocatorSnapshot {
    /// Validate `configs` and index them.
    pub fn build(configs: Vec<TenantConfig>) -> AppResult<Self> {
        let base_path_pattern = Regex::new(BASE_PATH_PATTERN)
            .map_err(|e| AppError::Internal(format!("Invalid base path pattern: {}", e)))?;

        let mut snapshot = LocatorSnapshot::default();
        for config in configs {
            if !base_path_pattern.is_match(&config.base_path) {
                return Err(AppError::InvalidConfiguration(format!(
                    "Invalid base path [{}]. Only one level path supported.",
                    config.base_path
                )));
            }
            if snapshot.base_paths.contains_key(&config.base_path) {
                return Err(AppError::InvalidConfiguration(format!(
                    "Duplicate base-path in configurations: {}",
                    config.base_path
                )));
            }

            let backend = effective_backend(&config)?;

            snapshot
                .base_paths
                .insert(config.base_path.clone(), config.id.clone());
            snapshot
                .tenant_codes
                .insert(config.tenant_code.clone(), config.id.clone());
            snapshot.backends.insert(config.id.clone(), backend);
            snapshot.configs.insert(config.id.clone(), Arc::new(config));
        }

        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// Backend that new archive data of `config` goes to.
///
/// The object-storage configuration named by `upload_config_id` wins when its
/// archive type is recognized; the grid-transfer configuration is next.
fn effective_backend(config: &TenantConfig) -> AppResult<BackendType> {
    let upload_config = config
        .archive_config(BackendType::ObjectStorage)
        .filter(|archive| config.upload_config_id.as_deref() == Some(archive.id.as_str()));
    if upload_config.is_some_and(|archive| archive.archive_type.is_some()) {
        return Ok(BackendType::ObjectStorage);
    }

    if config
        .archive_config(BackendType::GridTransfer)
        .is_some_and(|archive| archive.archive_type.is_some())
    {
        return Ok(BackendType::GridTransfer);
    }

    Err(AppError::InvalidConfiguration(format!(
        "Configuration {} ({}): invalid archive type configuration",
        config.id, config.base_path
    )))
}

fn config_not_found(config_id: &str) -> AppError {
    AppError::NotFound(format!("could not locate configuration: {}", config_id))
}

/// Process-wide tenant configuration cache with atomic reload.
pub struct ConfigurationLocator {
    store: Arc<dyn TenantConfigStore>,
    snapshot: RwLock<Option<Arc<LocatorSnapshot>>>,
}

impl ConfigurationLocator {
    pub fn new(store: Arc<dyn TenantConfigStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(None),
        }
    }

    /// Rebuild the index from the store and swap it in.
    #[tracing::instrument(skip(self))]
    pub async fn reload(&self) -> AppResult<()> {
        let configs = self.store.list_tenant_configs().await?;
        let snapshot = match LocatorSnapshot::build(configs) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                let loaded = self.is_loaded().await;
                tracing::error!(
                    error = %e,
                    loaded,
                    "Configuration reload rejected; keeping previous configurations"
                );
                return Err(e);
            }
        };

        let count = snapshot.len();
        *self.snapshot.write().await = Some(snapshot);
        tracing::info!(configurations = count, "Tenant configurations reloaded");
        Ok(())
    }

    /// Reload every `period` until the returned task is aborted.
    pub fn start_periodic_reload(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.reload().await {
                    tracing::warn!(error = %e, "Scheduled configuration reload failed");
                }
            }
        })
    }

    pub async fn is_loaded(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    /// Current snapshot; `NotFound` before the first successful reload.
    pub async fn snapshot(&self) -> AppResult<Arc<LocatorSnapshot>> {
        self.snapshot.read().await.clone().ok_or_else(|| {
            AppError::NotFound("Tenant configurations have not been loaded".to_string())
        })
    }

    pub async fn get_tenant_codes(&self) -> AppResult<BTreeSet<String>> {
        Ok(self.snapshot().await?.tenant_codes.keys().cloned().collect())
    }

    pub async fn get_base_paths(&self) -> AppResult<BTreeSet<String>> {
        Ok(self.snapshot().await?.base_paths.keys().cloned().collect())
    }

    /// Configuration id of the tenant owning `path`: the longest base path
    /// that equals `path` or is a whole-segment prefix of it.
    pub async fn get_config_id(&self, path: &str) -> AppResult<String> {
        let snapshot = self.snapshot().await?;
        snapshot
            .base_paths
            .iter()
            .filter(|(base_path, _)| {
                path.strip_prefix(base_path.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
            .max_by_key(|(base_path, _)| base_path.len())
            .map(|(_, config_id)| config_id.clone())
            .ok_or_else(|| {
                AppError::NotFound(format!("could not locate configuration for path: {}", path))
            })
    }

    pub async fn get_config_id_by_tenant_code(&self, tenant_code: &str) -> AppResult<String> {
        self.snapshot()
            .await?
            .tenant_codes
            .get(tenant_code)
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "could not locate configuration for tenant: {}",
                    tenant_code
                ))
            })
    }

    pub async fn get_config(&self, config_id: &str) -> AppResult<Arc<TenantConfig>> {
        self.snapshot()
            .await?
            .configs
            .get(config_id)
            .cloned()
            .ok_or_else(|| config_not_found(config_id))
    }

    pub async fn get_archive_backend_type(&self, config_id: &str) -> AppResult<BackendType> {
        self.snapshot()
            .await?
            .backends
            .get(config_id)
            .copied()
            .ok_or_else(|| config_not_found(config_id))
    }

    pub async fn get_archive_config(
        &self,
        config_id: &str,
        backend: BackendType,
    ) -> AppResult<ArchiveConfig> {
        let config = self.get_config(config_id).await?;
        config.archive_config(backend).cloned().ok_or_else(|| {
            AppError::NotFound(format!(
                "could not locate configuration: {} {}",
                config_id, backend
            ))
        })
    }
}
