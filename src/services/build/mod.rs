//! Build system providers.
//!
//! Each [`BuildProvider`] recognizes one kind of project and knows the commands that build,
//! test, run and clean it. [`BuildRegistry`] tries providers in priority order, and
//! [`Builder`] runs the chosen provider's commands with completion notifications.

pub mod builder;
pub mod cargo;
pub mod cmake;
pub mod go;
pub mod make;
pub mod meson;
pub mod python;

pub use builder::{BuildOperation, Builder};
pub use cargo::CargoProvider;
pub use cmake::CmakeProvider;
pub use go::GoProvider;
pub use make::MakeProvider;
pub use meson::MesonProvider;
pub use python::PythonProvider;

use crate::models::EdiSettings;
use crate::services::exe::{CommandLine, ExeError, Invocation, ShellArg};
use crate::services::path::has_suffix;
use camino::Utf8Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No build system recognized in {0}")]
    NoProvider(String),

    #[error("Unknown build provider: {0}")]
    UnknownProvider(String),

    #[error("{tool} is not installed")]
    ToolNotInstalled { tool: &'static str },

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Exe(#[from] ExeError),
}

/// One build system.
///
/// Command methods return `None` when the provider has nothing to run for this project.
pub trait BuildProvider: Send + Sync {
    fn id(&self) -> &'static str;

    /// Executable that must be on `PATH` before any command is attempted
    fn tool(&self) -> &'static str;

    /// Whether `project` is a project of this kind
    fn path_supported(&self, project: &Utf8Path) -> bool;

    /// Build artifacts to keep out of file listings
    fn file_hidden(&self, path: &Utf8Path) -> bool;

    fn project_runnable(&self, path: &Utf8Path) -> bool;

    fn build(&self, project: &Utf8Path) -> Option<Invocation>;

    fn test(&self, project: &Utf8Path) -> Option<Invocation>;

    fn run(&self, project: &Utf8Path, path: &ShellArg, args: &[ShellArg]) -> Option<Invocation>;

    fn clean(&self, project: &Utf8Path) -> Option<Invocation>;
}

/// Providers in detection priority order
#[derive(Clone)]
pub struct BuildRegistry {
    providers: Vec<Arc<dyn BuildProvider>>,
}

impl BuildRegistry {
    /// cmake, cargo, python, meson, go, then make as the generic fallback
    pub fn builtin(settings: &EdiSettings) -> Self {
        Self::with_providers(vec![
            Arc::new(CmakeProvider),
            Arc::new(CargoProvider),
            Arc::new(PythonProvider),
            Arc::new(MesonProvider::new(&settings.meson_build_dir)),
            Arc::new(GoProvider),
            Arc::new(MakeProvider::new(settings.compile_commands)),
        ])
    }

    pub fn with_providers(providers: Vec<Arc<dyn BuildProvider>>) -> Self {
        Self { providers }
    }

    /// First provider that recognizes `project`
    pub fn for_project_path(&self, project: &Utf8Path) -> Option<Arc<dyn BuildProvider>> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.path_supported(project))
            .cloned();

        match &provider {
            Some(p) => tracing::debug!("Detected {} project at {}", p.id(), project),
            None => tracing::debug!("No build system detected at {}", project),
        }
        provider
    }

    pub fn for_id(&self, id: &str) -> Option<Arc<dyn BuildProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }
}

impl Default for BuildRegistry {
    fn default() -> Self {
        Self::builtin(&EdiSettings::default())
    }
}

/// Execute a built binary directly
pub(crate) fn run_binary(path: &ShellArg, args: &[ShellArg]) -> Invocation {
    CommandLine::for_program(path.clone())
        .shell_args(args)
        .into()
}

/// Hidden when the path ends in any of `suffixes`
pub(crate) fn hidden_by_suffix(path: &Utf8Path, suffixes: &[&str]) -> bool {
    !path.as_str().is_empty() && suffixes.iter().any(|s| has_suffix(path, s))
}
