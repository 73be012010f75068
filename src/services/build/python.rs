use super::{BuildProvider, hidden_by_suffix};
use crate::services::exe::{CommandLine, Invocation, ShellArg};
use crate::services::path::relative_exists;
use camino::Utf8Path;

/// setuptools projects driven through `./setup.py`
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonProvider;

impl PythonProvider {
    fn setup(step: &'static str) -> CommandLine {
        CommandLine::new("./setup.py").arg(step)
    }
}

impl BuildProvider for PythonProvider {
    fn id(&self) -> &'static str {
        "python"
    }

    fn tool(&self) -> &'static str {
        "python3"
    }

    fn path_supported(&self, project: &Utf8Path) -> bool {
        relative_exists(project, "setup.py")
    }

    fn file_hidden(&self, path: &Utf8Path) -> bool {
        hidden_by_suffix(path, &[".pyc", ".pyo"])
    }

    fn project_runnable(&self, _path: &Utf8Path) -> bool {
        true
    }

    fn build(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(Self::setup("build").into())
    }

    fn test(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(Self::setup("test").into())
    }

    fn run(&self, _project: &Utf8Path, _path: &ShellArg, _args: &[ShellArg]) -> Option<Invocation> {
        Some(Self::setup("run").into())
    }

    fn clean(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(Self::setup("clean").arg("--all").into())
    }
}
