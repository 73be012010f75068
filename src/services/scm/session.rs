use super::avatar::avatar_url;
use super::git::GitEngine;
use super::{ScmEngine, ScmError};
use crate::models::{RemoteField, ScmOperation, StatusCode, StatusRecord};
use crate::services::exe::{CommandRunner, ExeService, ShellArg};
use crate::services::path::find_marker_root;
use crate::state::StateManager;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// One discovered repository and its cached state.
///
/// All operations take `&self`; mutable data lives in the [`StateManager`], so a session
/// can be shared behind an `Arc` between the foreground and background tasks.
pub struct ScmSession {
    engine: Arc<dyn ScmEngine>,
    marker_path: Utf8PathBuf,
    state: StateManager,
}

impl ScmSession {
    /// Search upward from `start` for a git repository
    pub fn discover(start: &Utf8Path) -> Option<Self> {
        Self::discover_with(start, None, Arc::new(ExeService::new()))
    }

    /// Discovery with an optional ceiling directory and a specific command runner
    pub fn discover_with(
        start: &Utf8Path,
        ceiling: Option<&Utf8Path>,
        runner: Arc<dyn CommandRunner>,
    ) -> Option<Self> {
        Self::open(start, ceiling, runner).ok()
    }

    /// Like [`discover_with`](Self::discover_with) for callers that need a session to
    /// proceed: a missing git or repository is [`ScmError::NotAvailable`].
    pub fn open(
        start: &Utf8Path,
        ceiling: Option<&Utf8Path>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ScmError> {
        let not_available = || ScmError::NotAvailable {
            tool: GitEngine::NAME,
            start: start.to_string(),
        };

        if !GitEngine::installed() {
            tracing::warn!("git is not installed, source control disabled");
            return Err(not_available());
        }

        let Some(root) = find_marker_root(start, GitEngine::DIRECTORY, ceiling) else {
            tracing::debug!("No {} found above {}", GitEngine::DIRECTORY, start);
            return Err(not_available());
        };

        tracing::info!("Found git repository at {}", root);
        Ok(Self::with_engine(Arc::new(GitEngine::new(root, runner))))
    }

    /// Wrap an already constructed backend
    pub fn with_engine(engine: Arc<dyn ScmEngine>) -> Self {
        Self::with_engine_and_state(engine, StateManager::new())
    }

    pub fn with_engine_and_state(engine: Arc<dyn ScmEngine>, state: StateManager) -> Self {
        let marker_path = engine.root().join(engine.directory());
        Self {
            engine,
            marker_path,
            state,
        }
    }

    pub fn name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn root(&self) -> &Utf8Path {
        self.engine.root()
    }

    pub fn marker_path(&self) -> &Utf8Path {
        &self.marker_path
    }

    pub fn engine(&self) -> &Arc<dyn ScmEngine> {
        &self.engine
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// The repository marker still exists
    pub fn enabled(&self) -> bool {
        self.marker_path.exists()
    }

    /// `origin` is configured
    pub async fn remote_enabled(&self) -> bool {
        match self.remote_url().await {
            Ok(url) => url.is_some(),
            Err(e) => {
                tracing::warn!("Failed to look up remote: {}", e);
                false
            }
        }
    }

    pub async fn stage(&self, path: &str) -> Result<i32, ScmError> {
        self.engine.stage(&ShellArg::new(path)?).await
    }

    pub async fn unstage(&self, path: &str) -> Result<i32, ScmError> {
        self.engine.unstage(&ShellArg::new(path)?).await
    }

    /// `git rm`; untracked paths must be removed from disk by the caller instead
    pub async fn delete(&self, path: &str) -> Result<i32, ScmError> {
        self.engine.delete(&ShellArg::new(path)?).await
    }

    pub async fn move_path(&self, src: &str, dest: &str) -> Result<i32, ScmError> {
        self.engine
            .move_path(&ShellArg::new(src)?, &ShellArg::new(dest)?)
            .await
    }

    pub async fn commit(&self, message: &str) -> Result<i32, ScmError> {
        self.engine.commit(&ShellArg::new(message)?).await
    }

    /// Fetch a fresh status list and replace the cached one
    pub async fn status(&self) -> Result<Vec<StatusRecord>, ScmError> {
        let records = self.engine.status().await?;
        self.state.replace_statuses(records.clone());
        Ok(records)
    }

    /// Status list from the last refresh
    pub fn cached_status(&self) -> Vec<StatusRecord> {
        self.state.statuses()
    }

    pub async fn file_status(&self, path: &str) -> Result<StatusCode, ScmError> {
        self.engine.file_status(&ShellArg::new(path)?).await
    }

    pub async fn diff(&self, cached: bool) -> Result<String, ScmError> {
        self.engine.diff(cached).await
    }

    pub async fn push(&self) -> Result<i32, ScmError> {
        self.engine.push().await
    }

    pub async fn pull(&self) -> Result<i32, ScmError> {
        self.engine.pull().await
    }

    pub async fn stash(&self) -> Result<i32, ScmError> {
        self.engine.stash().await
    }

    pub async fn remote_add(&self, url: &str) -> Result<i32, ScmError> {
        let code = self.engine.remote_add(&ShellArg::new(url)?).await;
        self.state.invalidate_remote(&[RemoteField::Url]);
        code
    }

    pub async fn remote_name(&self) -> Result<Option<String>, ScmError> {
        self.cached_lookup(RemoteField::Name).await
    }

    pub async fn remote_email(&self) -> Result<Option<String>, ScmError> {
        self.cached_lookup(RemoteField::Email).await
    }

    pub async fn remote_url(&self) -> Result<Option<String>, ScmError> {
        self.cached_lookup(RemoteField::Url).await
    }

    pub async fn credentials_set(&self, name: &str, email: &str) -> Result<i32, ScmError> {
        let code = self
            .engine
            .credentials_set(&ShellArg::new(name)?, &ShellArg::new(email)?)
            .await;
        self.state
            .invalidate_remote(&[RemoteField::Name, RemoteField::Email]);
        code
    }

    /// Gravatar URL for the configured user email
    pub async fn avatar_url(&self) -> Result<Option<String>, ScmError> {
        Ok(self
            .remote_email()
            .await?
            .and_then(|email| avatar_url(&email)))
    }

    async fn cached_lookup(&self, field: RemoteField) -> Result<Option<String>, ScmError> {
        if let Some(value) = self.state.cached_remote(field) {
            return Ok(Some(value));
        }

        let value = match field {
            RemoteField::Name => self.engine.remote_name().await?,
            RemoteField::Email => self.engine.remote_email().await?,
            RemoteField::Url => self.engine.remote_url().await?,
        };

        // empty answers are not cached so a later change is picked up
        if let Some(value) = &value {
            tracing::debug!("Caching {:?} = {}", field, value);
            self.state.cache_remote(field, value.clone());
        }
        Ok(value)
    }

    /// Refresh the status list on a background task
    pub fn spawn_status_refresh(self: &Arc<Self>) -> JoinHandle<Result<usize, ScmError>> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let records = session.status().await?;
            Ok(records.len())
        })
    }

    /// Run an operation on a background task and wait for its exit code
    pub async fn run_operation(self: &Arc<Self>, operation: ScmOperation) -> Result<i32, ScmError> {
        self.spawn_operation(operation)
            .await
            .map_err(|e| ScmError::Task(e.to_string()))?
    }

    /// Refresh the status list on a background task and wait for the record count
    pub async fn refresh_status(self: &Arc<Self>) -> Result<usize, ScmError> {
        self.spawn_status_refresh()
            .await
            .map_err(|e| ScmError::Task(e.to_string()))?
    }

    /// Run commit/push/pull/stash on a background task.
    ///
    /// The outcome is recorded in the session state, which broadcasts
    /// [`StateChange::OperationFinished`](crate::state::StateChange::OperationFinished).
    pub fn spawn_operation(
        self: &Arc<Self>,
        operation: ScmOperation,
    ) -> JoinHandle<Result<i32, ScmError>> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let name = operation.name();
            session.state.begin_operation(name);

            let result = match &operation {
                ScmOperation::Commit(message) => session.commit(message).await,
                ScmOperation::Push => session.push().await,
                ScmOperation::Pull => session.pull().await,
                ScmOperation::Stash => session.stash().await,
            };

            let code = match &result {
                Ok(code) => *code,
                Err(e) => {
                    tracing::warn!("{} failed: {}", name, e);
                    -1
                }
            };
            session.state.finish_operation(name, code);
            result
        })
    }
}

/// Holder for the process-wide active session.
///
/// Uninitialized until [`init`](Self::init) finds a repository; a later `init` releases
/// the previous session before installing the new one.
#[derive(Default)]
pub struct ScmSlot {
    current: Mutex<Option<Arc<ScmSession>>>,
}

impl ScmSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&self, start: &Utf8Path) -> Option<Arc<ScmSession>> {
        self.install(ScmSession::discover(start))
    }

    /// Replace the active session (or clear it with `None`)
    pub fn install(&self, session: Option<ScmSession>) -> Option<Arc<ScmSession>> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.take() {
            tracing::debug!("Releasing session for {}", previous.root());
            previous.state().reset();
        }
        *current = session.map(Arc::new);
        current.clone()
    }

    pub fn get(&self) -> Option<Arc<ScmSession>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.get().is_some()
    }

    pub fn shutdown(&self) {
        self.install(None);
    }
}
