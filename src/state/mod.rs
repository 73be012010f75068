// State management module
//
// StateManager wraps SessionState with thread-safe access using Arc<RwLock<T>>
// and emits change events to anyone presenting SCM state.

use crate::metrics::Metrics;
use crate::models::{OperationResult, RemoteField, SessionState, StatusRecord};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change events emitted when session state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A status refresh replaced the cached list
    StatusRefreshed { total: usize, staged: usize },

    /// Cached user name or email changed (including invalidation)
    CredentialsChanged {
        name: Option<String>,
        email: Option<String>,
    },

    /// Cached origin URL changed (including invalidation)
    RemoteChanged { url: Option<String> },

    /// A background operation has started
    OperationStarted { operation: &'static str },

    /// A background operation has finished
    OperationFinished { operation: &'static str, code: i32 },

    /// Session was shut down or replaced
    SessionReset,
}

/// Thread-safe session state with event emission
///
/// - [`read()`](Self::read) for reading state through a closure
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
pub struct StateManager {
    state: Arc<RwLock<SessionState>>,

    /// Multiple subscribers can listen for state changes
    state_tx: broadcast::Sender<StateChange>,

    metrics: Arc<Metrics>,
}

impl StateManager {
    /// Create a new StateManager with a broadcast buffer of 100 events
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(Metrics::new()))
    }

    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            state_tx,
            metrics,
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of the current state, safe to use without holding locks
    pub fn snapshot(&self) -> SessionState {
        self.read_guard().clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let staged = state_manager.read(|state| state.staged_count());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionState) -> R,
    {
        let state = self.read_guard();
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Captures the old state, applies `update_fn`, detects what changed and
    /// broadcasts one event per change. Returns the emitted events.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut state = self.write_guard();
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);
        for change in &changes {
            self.emit(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn emit(&self, change: StateChange) {
        // no subscriber is fine
        match self.state_tx.send(change) {
            Ok(_) => self.metrics.record_state_broadcast(),
            Err(_) => self.metrics.record_state_broadcast_error(),
        }
    }

    fn detect_changes(&self, old: &SessionState, new: &SessionState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.status_generation != new.status_generation {
            changes.push(StateChange::StatusRefreshed {
                total: new.statuses.len(),
                staged: new.staged_count(),
            });
        }

        if old.remote_name != new.remote_name || old.remote_email != new.remote_email {
            changes.push(StateChange::CredentialsChanged {
                name: new.remote_name.clone(),
                email: new.remote_email.clone(),
            });
        }

        if old.remote_url != new.remote_url {
            changes.push(StateChange::RemoteChanged {
                url: new.remote_url.clone(),
            });
        }

        if old.running_operation != new.running_operation {
            if let Some(operation) = new.running_operation {
                changes.push(StateChange::OperationStarted { operation });
            }
        }

        if old.last_result != new.last_result {
            if let Some(result) = &new.last_result {
                changes.push(StateChange::OperationFinished {
                    operation: result.operation,
                    code: result.code,
                });
            }
        }

        changes
    }

    // Convenience methods for common state updates

    /// Replace the cached status list in one step
    pub fn replace_statuses(&self, statuses: Vec<StatusRecord>) -> Vec<StateChange> {
        self.update(|state| {
            state.statuses = statuses;
            state.status_generation += 1;
        })
    }

    pub fn statuses(&self) -> Vec<StatusRecord> {
        self.read(|state| state.statuses.clone())
    }

    pub fn cached_remote(&self, field: RemoteField) -> Option<String> {
        self.read(|state| state.remote(field).map(str::to_string))
    }

    pub fn cache_remote(&self, field: RemoteField, value: String) -> Vec<StateChange> {
        self.update(|state| state.set_remote(field, Some(value)))
    }

    /// Forget cached remote values so the next lookup queries git again
    pub fn invalidate_remote(&self, fields: &[RemoteField]) -> Vec<StateChange> {
        self.update(|state| {
            for field in fields {
                state.set_remote(*field, None);
            }
        })
    }

    pub fn begin_operation(&self, operation: &'static str) -> Vec<StateChange> {
        self.update(|state| state.running_operation = Some(operation))
    }

    pub fn finish_operation(&self, operation: &'static str, code: i32) -> Vec<StateChange> {
        let mut changes = self.update(|state| {
            state.running_operation = None;
            state.last_result = Some(OperationResult { operation, code });
        });

        // a repeat of the previous result is still a finished operation
        let finished = StateChange::OperationFinished { operation, code };
        if !changes.contains(&finished) {
            self.emit(finished.clone());
            changes.push(finished);
        }
        changes
    }

    /// Drop all cached state and emit [`StateChange::SessionReset`]
    pub fn reset(&self) -> Vec<StateChange> {
        let mut changes = self.update(SessionState::reset);

        let reset_event = StateChange::SessionReset;
        self.emit(reset_event.clone());
        changes.push(reset_event);

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusCode;
    use crate::services::exe::ShellArg;
    use camino::Utf8PathBuf;

    fn record(path: &str, change: StatusCode) -> StatusRecord {
        StatusRecord {
            path: ShellArg::new(path).unwrap(),
            fullpath: Utf8PathBuf::from("/repo").join(path),
            unescaped: path.to_string(),
            orig_path: None,
            change,
            staged: change.is_staged(),
        }
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(state.statuses.is_empty());
        assert_eq!(state.status_generation, 0);
        assert!(state.remote_url.is_none());
    }

    #[test]
    fn test_replace_statuses_emits_refresh() {
        let manager = StateManager::new();

        let changes = manager.replace_statuses(vec![
            record("a.txt", StatusCode::AddedStaged),
            record("b.txt", StatusCode::Modified),
        ]);

        assert_eq!(
            changes,
            vec![StateChange::StatusRefreshed { total: 2, staged: 1 }]
        );
        assert_eq!(manager.statuses().len(), 2);
    }

    #[test]
    fn test_identical_refresh_still_reported() {
        let manager = StateManager::new();
        manager.replace_statuses(Vec::new());

        let changes = manager.replace_statuses(Vec::new());
        assert_eq!(
            changes,
            vec![StateChange::StatusRefreshed { total: 0, staged: 0 }]
        );
        assert_eq!(manager.read(|s| s.status_generation), 2);
    }

    #[test]
    fn test_remote_cache_and_invalidate() {
        let manager = StateManager::new();

        let changes = manager.cache_remote(RemoteField::Name, "Ada".to_string());
        assert!(matches!(
            &changes[0],
            StateChange::CredentialsChanged { name: Some(n), email: None } if n == "Ada"
        ));
        assert_eq!(manager.cached_remote(RemoteField::Name), Some("Ada".to_string()));

        manager.cache_remote(RemoteField::Url, "https://example.com/r.git".to_string());
        let changes = manager.invalidate_remote(&[RemoteField::Name, RemoteField::Email]);
        assert_eq!(
            changes,
            vec![StateChange::CredentialsChanged {
                name: None,
                email: None
            }]
        );
        assert!(manager.cached_remote(RemoteField::Url).is_some());
    }

    #[test]
    fn test_invalidate_uncached_is_silent() {
        let manager = StateManager::new();
        assert!(manager.invalidate_remote(&[RemoteField::Url]).is_empty());
    }

    #[test]
    fn test_operation_lifecycle() {
        let manager = StateManager::new();

        let started = manager.begin_operation("push");
        assert_eq!(started, vec![StateChange::OperationStarted { operation: "push" }]);

        let finished = manager.finish_operation("push", 128);
        assert_eq!(
            finished,
            vec![StateChange::OperationFinished {
                operation: "push",
                code: 128
            }]
        );

        let state = manager.snapshot();
        assert!(state.running_operation.is_none());
        assert_eq!(
            state.last_result,
            Some(OperationResult {
                operation: "push",
                code: 128
            })
        );
    }

    #[test]
    fn test_reset() {
        let manager = StateManager::new();
        manager.replace_statuses(vec![record("a.txt", StatusCode::Untracked)]);
        manager.cache_remote(RemoteField::Email, "a@b.c".to_string());

        let changes = manager.reset();

        assert!(changes.contains(&StateChange::SessionReset));
        assert_eq!(manager.snapshot(), SessionState::default());
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.begin_operation("pull");

        let event = rx.try_recv();
        assert!(matches!(
            event.unwrap(),
            StateChange::OperationStarted { operation: "pull" }
        ));
    }

    #[test]
    fn test_broadcast_metrics() {
        let metrics = Arc::new(Metrics::new());
        let manager = StateManager::with_metrics(Arc::clone(&metrics));

        manager.begin_operation("stash");
        let _rx = manager.subscribe();
        manager.finish_operation("stash", 0);

        assert_eq!(
            metrics
                .state_broadcast_errors
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
        assert_eq!(
            metrics
                .state_broadcasts
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.cache_remote(RemoteField::Url, "git@host:r.git".to_string());

        assert_eq!(
            manager2.cached_remote(RemoteField::Url),
            Some("git@host:r.git".to_string())
        );
    }
}
