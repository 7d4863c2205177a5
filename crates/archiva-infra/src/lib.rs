//! Archiva Infrastructure Library
//!
//! Process-level plumbing shared by Archiva binaries: tracing subscriber
//! installation.

pub mod telemetry;

pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryFormat};
