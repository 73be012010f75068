//! Data models for edi-core.
//!
//! - [`EdiConfig`]: user settings loaded from `Edi Settings.yaml`
//! - [`StatusRecord`] / [`StatusCode`]: one parsed line of `git status --porcelain`
//! - [`SessionState`]: cached status list, remote lookups and operation results of an
//!   SCM session, shared through [`StateManager`](crate::state::StateManager)

pub mod config;
pub mod session_state;
pub mod status;

pub use config::{EdiConfig, EdiSettings};
pub use session_state::{OperationResult, RemoteField, ScmOperation, SessionState};
pub use status::{StatusCode, StatusRecord};
