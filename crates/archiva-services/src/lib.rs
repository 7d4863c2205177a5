//! Archiva Services Layer
//!
//! Business services of the control plane: the tenant configuration locator
//! and the data transfer service that routes uploads and downloads to the
//! right backend proxy for a tenant.

pub mod configuration;
pub mod transfer;

pub use configuration::{ConfigurationLocator, LocatorSnapshot};
pub use transfer::{BackendAccounts, DataTransferService};
