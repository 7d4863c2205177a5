#[cfg(feature = "backend-cloud-drives")]
use crate::{BoxProxy, GoogleDriveProxy};
#[cfg(feature = "backend-grid-transfer")]
use crate::GridTransferProxy;
#[cfg(feature = "backend-object-storage")]
use crate::ObjectStorageProxy;
#[cfg(not(all(
    feature = "backend-object-storage",
    feature = "backend-grid-transfer",
    feature = "backend-cloud-drives"
)))]
use crate::TransferError;
use crate::{TransferProxy, TransferResult, TransferTracker};
use archiva_core::{BackendType, TransferSettings};
use std::sync::Arc;

/// Create the transfer proxy for `backend`.
///
/// Asynchronous proxies record their transfers in `tracker`; pass the same
/// tracker to every proxy that should share one request-id namespace.
pub fn create_transfer_proxy(
    backend: BackendType,
    settings: &TransferSettings,
    tracker: TransferTracker,
) -> TransferResult<Arc<dyn TransferProxy>> {
    #[cfg(not(any(feature = "backend-object-storage", feature = "backend-cloud-drives")))]
    let _ = &tracker;

    match backend {
        #[cfg(feature = "backend-object-storage")]
        BackendType::ObjectStorage => Ok(Arc::new(ObjectStorageProxy::new(settings, tracker)?)),

        #[cfg(not(feature = "backend-object-storage"))]
        BackendType::ObjectStorage => Err(TransferError::ConfigError(
            "Object storage backend not available (backend-object-storage feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "backend-grid-transfer")]
        BackendType::GridTransfer => Ok(Arc::new(GridTransferProxy::new(settings)?)),

        #[cfg(not(feature = "backend-grid-transfer"))]
        BackendType::GridTransfer => Err(TransferError::ConfigError(
            "Grid transfer backend not available (backend-grid-transfer feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "backend-cloud-drives")]
        BackendType::GoogleDrive => Ok(Arc::new(GoogleDriveProxy::new(settings, tracker)?)),

        #[cfg(feature = "backend-cloud-drives")]
        BackendType::Box => Ok(Arc::new(BoxProxy::new(settings, tracker)?)),

        #[cfg(not(feature = "backend-cloud-drives"))]
        BackendType::GoogleDrive | BackendType::Box => Err(TransferError::ConfigError(format!(
            "{} backend not available (backend-cloud-drives feature not enabled)",
            backend
        ))),
    }
}

#[cfg(all(
    test,
    feature = "backend-object-storage",
    feature = "backend-grid-transfer",
    feature = "backend-cloud-drives"
))]
mod tests {
    use super::*;

    #[test]
    fn test_every_backend_has_a_proxy() {
        let settings = TransferSettings::default();
        let tracker = TransferTracker::new();
        for backend in BackendType::ALL {
            let proxy = create_transfer_proxy(backend, &settings, tracker.clone()).unwrap();
            assert_eq!(proxy.backend_type(), backend);
        }
    }
}
