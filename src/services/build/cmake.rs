use super::make::MAKE;
use super::{BuildProvider, hidden_by_suffix, run_binary};
use crate::services::exe::{CommandLine, Invocation, ShellArg, ShellPipeline};
use crate::services::path::{file_name, relative_exists};
use camino::Utf8Path;

const BUILD_DIR: &str = "build";
const HIDDEN_SUFFIXES: &[&str] = &[".o", ".so", ".lo", ".a", ".la"];

#[derive(Debug, Clone, Copy, Default)]
pub struct CmakeProvider;

impl CmakeProvider {
    fn in_build_dir(step: CommandLine) -> Invocation {
        ShellPipeline::new()
            .then(CommandLine::new("cd").arg(BUILD_DIR))
            .then(step)
            .into()
    }
}

impl BuildProvider for CmakeProvider {
    fn id(&self) -> &'static str {
        "cmake"
    }

    fn tool(&self) -> &'static str {
        "cmake"
    }

    fn path_supported(&self, project: &Utf8Path) -> bool {
        relative_exists(project, "CMakeLists.txt")
    }

    fn file_hidden(&self, path: &Utf8Path) -> bool {
        matches!(file_name(path), BUILD_DIR | "autom4te.cache")
            || hidden_by_suffix(path, HIDDEN_SUFFIXES)
    }

    fn project_runnable(&self, path: &Utf8Path) -> bool {
        !path.as_str().is_empty() && path.exists()
    }

    fn build(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(
            ShellPipeline::new()
                .then(CommandLine::new("mkdir").args(&["-p", BUILD_DIR]))
                .then(CommandLine::new("cd").arg(BUILD_DIR))
                .then(CommandLine::new("cmake").args(&["-DCMAKE_EXPORT_COMPILE_COMMANDS=1", ".."]))
                .then(CommandLine::new(MAKE))
                .into(),
        )
    }

    fn test(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(Self::in_build_dir(
            CommandLine::new("env").args(&["CK_VERBOSITY=verbose", MAKE, "check"]),
        ))
    }

    fn run(&self, _project: &Utf8Path, path: &ShellArg, args: &[ShellArg]) -> Option<Invocation> {
        Some(run_binary(path, args))
    }

    fn clean(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(Self::in_build_dir(CommandLine::new(MAKE).arg("clean")))
    }
}
