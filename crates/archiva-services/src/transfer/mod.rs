pub mod service;

pub use service::{BackendAccounts, DataTransferService};
