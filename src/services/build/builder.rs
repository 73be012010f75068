use super::{BuildError, BuildProvider, BuildRegistry};
use crate::models::EdiSettings;
use crate::services::exe::{ExeService, Invocation, LineSink, RunningProcess, ShellArg};
use crate::services::notify::{
    BUILD_CHANNEL, CLEAN_CHANNEL, NotifyHub, RUN_CHANNEL, TEST_CHANNEL,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOperation {
    Build,
    Test,
    Clean,
    Run,
}

impl BuildOperation {
    pub fn name(self) -> &'static str {
        match self {
            BuildOperation::Build => "build",
            BuildOperation::Test => "test",
            BuildOperation::Clean => "clean",
            BuildOperation::Run => "run",
        }
    }

    /// Completion channel the operation reports on
    pub fn channel(self) -> &'static str {
        match self {
            BuildOperation::Build => BUILD_CHANNEL,
            BuildOperation::Test => TEST_CHANNEL,
            BuildOperation::Clean => CLEAN_CHANNEL,
            BuildOperation::Run => RUN_CHANNEL,
        }
    }
}

impl fmt::Display for BuildOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs build operations for one project.
///
/// Every operation streams output to the optional sink and publishes its exit code on
/// the operation's [`NotifyHub`] channel.
pub struct Builder {
    project: Utf8PathBuf,
    registry: BuildRegistry,
    exe: ExeService,
    hub: NotifyHub,
    provider_override: Option<String>,
}

impl Builder {
    pub fn new(
        project: impl Into<Utf8PathBuf>,
        registry: BuildRegistry,
        exe: ExeService,
        hub: NotifyHub,
    ) -> Self {
        Self {
            project: project.into(),
            registry,
            exe,
            hub,
            provider_override: None,
        }
    }

    /// Builder with the built-in providers and executor configured from `settings`
    pub fn from_settings(project: impl Into<Utf8PathBuf>, settings: &EdiSettings) -> Self {
        let exe = ExeService::new()
            .with_timeout(settings.command_timeout())
            .with_environment(settings.build_environment.clone());

        Self::new(
            project,
            BuildRegistry::builtin(settings),
            exe,
            NotifyHub::with_capacity(settings.notify_capacity),
        )
        .with_provider_override(settings.build_provider_override().map(str::to_string))
    }

    /// Use the provider with this id instead of detecting one
    pub fn with_provider_override(mut self, id: Option<String>) -> Self {
        self.provider_override = id;
        self
    }

    pub fn project(&self) -> &Utf8Path {
        &self.project
    }

    pub fn hub(&self) -> &NotifyHub {
        &self.hub
    }

    pub fn exe(&self) -> &ExeService {
        &self.exe
    }

    /// The provider for this project, overridden or detected
    pub fn provider(&self) -> Result<Arc<dyn BuildProvider>, BuildError> {
        match &self.provider_override {
            Some(id) => self
                .registry
                .for_id(id)
                .ok_or_else(|| BuildError::UnknownProvider(id.clone())),
            None => self
                .registry
                .for_project_path(&self.project)
                .ok_or_else(|| BuildError::NoProvider(self.project.to_string())),
        }
    }

    pub fn can_build(&self) -> bool {
        self.provider().is_ok()
    }

    pub fn file_hidden(&self, path: &Utf8Path) -> bool {
        self.provider().is_ok_and(|p| p.file_hidden(path))
    }

    pub fn project_runnable(&self, path: &Utf8Path) -> bool {
        self.provider().is_ok_and(|p| p.project_runnable(path))
    }

    pub fn build(&self, sink: Option<LineSink>) -> Result<RunningProcess, BuildError> {
        self.launch(BuildOperation::Build, sink, |p, project| p.build(project))
    }

    pub fn test(&self, sink: Option<LineSink>) -> Result<RunningProcess, BuildError> {
        self.launch(BuildOperation::Test, sink, |p, project| p.test(project))
    }

    pub fn clean(&self, sink: Option<LineSink>) -> Result<RunningProcess, BuildError> {
        self.launch(BuildOperation::Clean, sink, |p, project| p.clean(project))
    }

    /// Run `path` with `args`, a shell-style argument string split into words
    pub fn run(
        &self,
        path: &str,
        args: Option<&str>,
        sink: Option<LineSink>,
    ) -> Result<RunningProcess, BuildError> {
        let path = ShellArg::new(path)?;
        let args = split_args(args.unwrap_or_default())?;

        self.launch(BuildOperation::Run, sink, |p, project| {
            p.run(project, &path, &args)
        })
    }

    fn launch<F>(
        &self,
        operation: BuildOperation,
        sink: Option<LineSink>,
        invocation: F,
    ) -> Result<RunningProcess, BuildError>
    where
        F: FnOnce(&dyn BuildProvider, &Utf8Path) -> Option<Invocation>,
    {
        let provider = self.provider()?;

        if !ExeService::tool_installed(provider.tool()) {
            tracing::warn!(
                "Not running {} for {}: {} is not installed",
                operation,
                self.project,
                provider.tool()
            );
            return Err(BuildError::ToolNotInstalled {
                tool: provider.tool(),
            });
        }

        let invocation =
            invocation(provider.as_ref(), &self.project).ok_or(BuildError::Unsupported {
                provider: provider.id(),
                operation: operation.name(),
            })?;

        tracing::info!("{} {} with {}", operation, self.project, provider.id());
        Ok(self.exe.notify(
            &self.hub,
            operation.channel(),
            &invocation,
            &self.project,
            sink,
        )?)
    }
}

fn split_args(args: &str) -> Result<Vec<ShellArg>, BuildError> {
    let words = shlex::split(args)
        .ok_or_else(|| BuildError::InvalidArguments(args.to_string()))?;
    words
        .into_iter()
        .map(|word| ShellArg::new(word).map_err(BuildError::from))
        .collect()
}
