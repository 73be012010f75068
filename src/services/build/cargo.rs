use super::{BuildProvider, hidden_by_suffix};
use crate::services::exe::{CommandLine, Invocation, ShellArg};
use crate::services::path::{file_name, relative_exists};
use camino::Utf8Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct CargoProvider;

impl BuildProvider for CargoProvider {
    fn id(&self) -> &'static str {
        "cargo"
    }

    fn tool(&self) -> &'static str {
        "cargo"
    }

    fn path_supported(&self, project: &Utf8Path) -> bool {
        relative_exists(project, "Cargo.toml")
    }

    fn file_hidden(&self, path: &Utf8Path) -> bool {
        file_name(path) == "target" || hidden_by_suffix(path, &[".o"])
    }

    fn project_runnable(&self, _path: &Utf8Path) -> bool {
        true
    }

    fn build(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(CommandLine::new("cargo").arg("build").into())
    }

    fn test(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(CommandLine::new("cargo").arg("test").into())
    }

    /// `cargo run`; the target path is chosen by cargo, arguments follow `--`
    fn run(&self, _project: &Utf8Path, _path: &ShellArg, args: &[ShellArg]) -> Option<Invocation> {
        let mut command = CommandLine::new("cargo").arg("run");
        if !args.is_empty() {
            command = command.arg("--").shell_args(args);
        }
        Some(command.into())
    }

    fn clean(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(CommandLine::new("cargo").arg("clean").into())
    }
}
