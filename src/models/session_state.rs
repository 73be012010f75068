use crate::models::status::StatusRecord;
use std::fmt;

/// Long-running SCM operations that are dispatched onto background tasks
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScmOperation {
    Commit(String),
    Push,
    Pull,
    Stash,
}

impl ScmOperation {
    pub fn name(&self) -> &'static str {
        match self {
            ScmOperation::Commit(_) => "commit",
            ScmOperation::Push => "push",
            ScmOperation::Pull => "pull",
            ScmOperation::Stash => "stash",
        }
    }
}

impl fmt::Display for ScmOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of the most recent background operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationResult {
    pub operation: &'static str,
    /// Exit code, or -1 when the command could not be run at all
    pub code: i32,
}

/// Cached remote lookups
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteField {
    Name,
    Email,
    Url,
}

/// Mutable state of one SCM session.
///
/// Wrapped in `Arc<RwLock<_>>` by [`StateManager`](crate::state::StateManager); the status
/// list is always replaced wholesale under the write lock, so readers see either the old
/// list or the new one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub statuses: Vec<StatusRecord>,

    /// Bumped on every refresh, even when the list is unchanged
    pub status_generation: u64,

    pub remote_name: Option<String>,
    pub remote_email: Option<String>,
    pub remote_url: Option<String>,

    pub running_operation: Option<&'static str>,
    pub last_result: Option<OperationResult>,
}

impl SessionState {
    pub fn staged_count(&self) -> usize {
        self.statuses.iter().filter(|r| r.staged).count()
    }

    pub fn remote(&self, field: RemoteField) -> Option<&str> {
        match field {
            RemoteField::Name => self.remote_name.as_deref(),
            RemoteField::Email => self.remote_email.as_deref(),
            RemoteField::Url => self.remote_url.as_deref(),
        }
    }

    pub fn set_remote(&mut self, field: RemoteField, value: Option<String>) {
        let slot = match field {
            RemoteField::Name => &mut self.remote_name,
            RemoteField::Email => &mut self.remote_email,
            RemoteField::Url => &mut self.remote_url,
        };
        *slot = value;
    }

    /// Drop every cached value
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
