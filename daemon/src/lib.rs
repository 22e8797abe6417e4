//! Task Daemon binary support library: configuration, the Environment
//! Registry startup sequence, and telemetry initialization. The binary
//! entry point lives in `main.rs`; this module split exists so
//! integration tests can exercise config parsing and environment setup
//! directly.

pub mod config;
pub mod setup;
pub mod telemetry;

pub use config::Config;
