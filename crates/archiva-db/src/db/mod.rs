//! Database repositories for data access layer
//
// Pool setup and migrations
pub mod setup;
//
// Tenant configuration store
pub mod tenant_config;

pub use setup::connect;
pub use tenant_config::TenantConfigRepository;
