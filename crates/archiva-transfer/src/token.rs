//! Opaque session tokens
//!
//! A token wraps whatever a backend needs to act for one session. It never
//! implements serde traits and its `Debug` output hides the secret.

use archiva_core::BackendType;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::traits::{TransferError, TransferResult};

#[derive(Clone)]
pub(crate) struct ObjectStorageCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint: Option<String>,
}

#[derive(Clone)]
enum Credential {
    #[cfg_attr(not(feature = "backend-object-storage"), allow(dead_code))]
    ObjectStorage(ObjectStorageCredential),
    Bearer(String),
}

/// Session token returned by `TransferProxy::authenticate`.
#[derive(Clone)]
pub struct AuthToken {
    session_id: Uuid,
    backend: BackendType,
    issued_at: DateTime<Utc>,
    credential: Credential,
}

impl AuthToken {
    /// Token carrying a bearer access token for `backend`.
    pub fn from_bearer(backend: BackendType, access_token: impl Into<String>) -> Self {
        Self::new(backend, Credential::Bearer(access_token.into()))
    }

    #[cfg_attr(not(feature = "backend-object-storage"), allow(dead_code))]
    pub(crate) fn object_storage(credential: ObjectStorageCredential) -> Self {
        Self::new(BackendType::ObjectStorage, Credential::ObjectStorage(credential))
    }

    fn new(backend: BackendType, credential: Credential) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            backend,
            issued_at: Utc::now(),
            credential,
        }
    }

    pub fn backend(&self) -> BackendType {
        self.backend
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Bearer secret, if this token was issued for `expected`.
    #[cfg_attr(
        not(any(feature = "backend-grid-transfer", feature = "backend-cloud-drives")),
        allow(dead_code)
    )]
    pub(crate) fn bearer_for(&self, expected: BackendType) -> TransferResult<&str> {
        self.ensure_backend(expected)?;
        match &self.credential {
            Credential::Bearer(secret) => Ok(secret),
            Credential::ObjectStorage(_) => Err(mismatch(expected)),
        }
    }

    #[cfg_attr(not(feature = "backend-object-storage"), allow(dead_code))]
    pub(crate) fn object_storage_credential(&self) -> TransferResult<&ObjectStorageCredential> {
        self.ensure_backend(BackendType::ObjectStorage)?;
        match &self.credential {
            Credential::ObjectStorage(credential) => Ok(credential),
            Credential::Bearer(_) => Err(mismatch(BackendType::ObjectStorage)),
        }
    }

    fn ensure_backend(&self, expected: BackendType) -> TransferResult<()> {
        if self.backend != expected {
            return Err(mismatch(expected));
        }
        Ok(())
    }
}

fn mismatch(expected: BackendType) -> TransferError {
    TransferError::Authentication(format!("token was not issued for {}", expected))
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("session_id", &self.session_id)
            .field("backend", &self.backend)
            .field("issued_at", &self.issued_at)
            .field("credential", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secret() {
        let token = AuthToken::from_bearer(BackendType::Box, "very-secret");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("Box"));
    }

    #[test]
    fn test_token_is_bound_to_its_backend() {
        let token = AuthToken::from_bearer(BackendType::GoogleDrive, "abc");
        assert_eq!(token.bearer_for(BackendType::GoogleDrive).unwrap(), "abc");
        assert!(matches!(
            token.bearer_for(BackendType::Box),
            Err(TransferError::Authentication(_))
        ));
        assert!(token.object_storage_credential().is_err());
    }

    #[test]
    fn test_each_token_is_a_new_session() {
        let first = AuthToken::from_bearer(BackendType::Box, "abc");
        let second = AuthToken::from_bearer(BackendType::Box, "abc");
        assert_ne!(first.session_id(), second.session_id());
    }
}
