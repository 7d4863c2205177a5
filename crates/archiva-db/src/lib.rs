//! Archiva Database Library
//!
//! PostgreSQL access for the control plane: connection setup with embedded
//! migrations, and the tenant configuration store read by the configuration
//! locator.

pub mod db;

pub use db::{connect, TenantConfigRepository};
