//! Source control.
//!
//! [`ScmEngine`] is the capability surface every backend implements (today only
//! [`GitEngine`]). [`ScmSession`] owns one discovered repository, caches its status list
//! and remote lookups, and runs long operations in the background. [`ScmSlot`] holds the
//! process-wide active session for callers that want a single one.

pub mod avatar;
pub mod diff;
pub mod git;
pub mod session;
pub mod status;

pub use avatar::avatar_url;
pub use diff::{DiffOutcome, DiffStreamer};
pub use git::GitEngine;
pub use session::{ScmSession, ScmSlot};
pub use status::{parse_line, parse_porcelain, status_code, unquote_path};

use crate::models::{StatusCode, StatusRecord};
use crate::services::exe::{ExeError, ShellArg};
use async_trait::async_trait;
use camino::Utf8Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScmError {
    #[error("No usable {tool} repository at or above {start}")]
    NotAvailable { tool: &'static str, start: String },

    #[error(transparent)]
    Exe(#[from] ExeError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Operations a source control backend supports.
///
/// Methods returning `i32` report the tool's exit code; non-zero is not an error.
#[async_trait]
pub trait ScmEngine: Send + Sync {
    /// Backend name, e.g. `git`
    fn name(&self) -> &'static str;

    /// Marker directory identifying a repository root, e.g. `.git`
    fn directory(&self) -> &'static str;

    fn root(&self) -> &Utf8Path;

    async fn stage(&self, path: &ShellArg) -> Result<i32, ScmError>;

    /// Remove `path` from the index. A path with nothing staged is left alone and
    /// reports success.
    async fn unstage(&self, path: &ShellArg) -> Result<i32, ScmError>;

    async fn delete(&self, path: &ShellArg) -> Result<i32, ScmError>;

    async fn move_path(&self, src: &ShellArg, dest: &ShellArg) -> Result<i32, ScmError>;

    async fn commit(&self, message: &ShellArg) -> Result<i32, ScmError>;

    async fn status(&self) -> Result<Vec<StatusRecord>, ScmError>;

    async fn file_status(&self, path: &ShellArg) -> Result<StatusCode, ScmError>;

    async fn diff(&self, cached: bool) -> Result<String, ScmError>;

    async fn push(&self) -> Result<i32, ScmError>;

    async fn pull(&self) -> Result<i32, ScmError>;

    async fn stash(&self) -> Result<i32, ScmError>;

    /// Add `origin` and publish the current branch to it
    async fn remote_add(&self, url: &ShellArg) -> Result<i32, ScmError>;

    async fn remote_name(&self) -> Result<Option<String>, ScmError>;

    async fn remote_email(&self) -> Result<Option<String>, ScmError>;

    async fn remote_url(&self) -> Result<Option<String>, ScmError>;

    async fn credentials_set(&self, name: &ShellArg, email: &ShellArg) -> Result<i32, ScmError>;
}
