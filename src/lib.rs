// ModOps - queued install/uninstall engine for Spore ModAPI and legacy patch mods
//
// This is the library crate containing the queue, worker harness and install engine.
// The binary crate (main.rs) provides a command line front end.

pub mod config;
pub mod logging;
pub mod manager;
pub mod models;
pub mod queue;
pub mod services;
pub mod worker;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use manager::{InstallOutcome, ModManager};
pub use models::{ErrorCode, ModOpError, ModOpsConfig, QueueSnapshot};
pub use queue::OperationQueue;
pub use services::InstallEngine;
pub use worker::ExecutionHarness;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
