//! Data models for the control plane
//!
//! Organized by concern: addresses in a backend, tenant configuration records,
//! the transfer lifecycle and the batch download reports.

mod batch;
mod collection;
mod location;
mod tenant;
mod transfer;

pub use batch::*;
pub use collection::*;
pub use location::*;
pub use tenant::*;
pub use transfer::*;
