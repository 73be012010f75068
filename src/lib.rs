// edi-core - source control and build tool orchestration for the Edi IDE
//
// This is the library crate containing the SCM and build services and their data models.
// The binary crate (main.rs) provides the `edi` command line front end.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{EdiConfig, EdiSettings, ScmOperation, SessionState, StatusCode, StatusRecord};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
