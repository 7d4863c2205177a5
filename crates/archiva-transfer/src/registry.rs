use std::collections::HashMap;
use std::sync::Arc;

use archiva_core::{BackendType, TransferSettings};

use crate::factory::create_transfer_proxy;
use crate::tracker::TransferTracker;
use crate::traits::{TransferError, TransferProxy, TransferResult};

/// Lookup table from backend type to its proxy.
#[derive(Clone, Default)]
pub struct TransferProxyRegistry {
    proxies: HashMap<BackendType, Arc<dyn TransferProxy>>,
    tracker: TransferTracker,
}

impl TransferProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one proxy per backend type, all sharing a single tracker.
    pub fn from_settings(settings: &TransferSettings) -> TransferResult<Self> {
        let mut registry = Self {
            proxies: HashMap::new(),
            tracker: TransferTracker::with_retention(settings.tracker_retention),
        };
        for backend in BackendType::ALL {
            let proxy = create_transfer_proxy(backend, settings, registry.tracker.clone())?;
            registry.register(proxy);
        }

        tracing::info!(
            backends = ?registry.backends(),
            "Transfer proxies registered"
        );

        Ok(registry)
    }

    /// Register `proxy` under its own backend type, replacing any previous one.
    pub fn register(&mut self, proxy: Arc<dyn TransferProxy>) {
        let backend = proxy.backend_type();
        if self.proxies.insert(backend, proxy).is_some() {
            tracing::warn!(backend = %backend, "Replaced registered transfer proxy");
        }
    }

    pub fn get(&self, backend: BackendType) -> TransferResult<Arc<dyn TransferProxy>> {
        self.proxies.get(&backend).cloned().ok_or_else(|| {
            TransferError::NotFound(format!("No transfer proxy registered for {}", backend))
        })
    }

    pub fn backends(&self) -> Vec<BackendType> {
        let mut backends: Vec<_> = self.proxies.keys().copied().collect();
        backends.sort();
        backends
    }

    pub fn tracker(&self) -> &TransferTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::AuthToken;
    use archiva_core::models::IntegratedSystemAccount;
    use async_trait::async_trait;

    struct FixedProxy(BackendType);

    #[async_trait]
    impl TransferProxy for FixedProxy {
        fn backend_type(&self) -> BackendType {
            self.0
        }

        async fn authenticate(
            &self,
            account: &IntegratedSystemAccount,
        ) -> TransferResult<AuthToken> {
            Ok(AuthToken::from_bearer(self.0, account.password.clone()))
        }
    }

    #[test]
    fn test_get_unregistered_backend() {
        let registry = TransferProxyRegistry::new();
        assert!(matches!(
            registry.get(BackendType::Box),
            Err(TransferError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_keys_by_backend_type() {
        let mut registry = TransferProxyRegistry::new();
        registry.register(Arc::new(FixedProxy(BackendType::GoogleDrive)));

        let proxy = registry.get(BackendType::GoogleDrive).unwrap();
        let token = proxy
            .authenticate(&IntegratedSystemAccount::new("u", "p"))
            .await
            .unwrap();
        assert_eq!(token.backend(), BackendType::GoogleDrive);
        assert_eq!(registry.backends(), vec![BackendType::GoogleDrive]);
    }

    #[cfg(all(
        feature = "backend-object-storage",
        feature = "backend-grid-transfer",
        feature = "backend-cloud-drives"
    ))]
    #[test]
    fn test_from_settings_covers_every_backend() {
        let registry = TransferProxyRegistry::from_settings(&TransferSettings::default()).unwrap();
        assert_eq!(registry.backends().len(), BackendType::ALL.len());
    }
}
