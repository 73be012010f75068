use super::{BuildProvider, hidden_by_suffix, run_binary};
use crate::services::exe::{CommandLine, ExeService, Invocation, ShellArg, ShellPipeline};
use crate::services::path::relative_exists;
use camino::Utf8Path;

#[cfg(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub(crate) const MAKE: &str = "gmake";

#[cfg(not(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
pub(crate) const MAKE: &str = "make";

const HIDDEN_SUFFIXES: &[&str] = &[".o", ".so", ".lo", ".a", ".la"];

/// Autotools / plain makefile projects, the fallback when nothing more specific matches
#[derive(Debug, Clone, Default)]
pub struct MakeProvider {
    compile_commands: bool,
}

impl MakeProvider {
    /// `compile_commands` wraps make in `bear --` when bear is installed
    pub fn new(compile_commands: bool) -> Self {
        Self { compile_commands }
    }

    fn make(&self) -> CommandLine {
        if self.compile_commands && ExeService::tool_installed("bear") {
            CommandLine::new("bear").args(&["--", MAKE])
        } else {
            CommandLine::new(MAKE)
        }
    }

    fn has_makefile(project: &Utf8Path) -> bool {
        relative_exists(project, "Makefile") || relative_exists(project, "makefile")
    }
}

impl BuildProvider for MakeProvider {
    fn id(&self) -> &'static str {
        "make"
    }

    fn tool(&self) -> &'static str {
        MAKE
    }

    fn path_supported(&self, project: &Utf8Path) -> bool {
        Self::has_makefile(project)
            || relative_exists(project, "configure")
            || relative_exists(project, "autogen.sh")
    }

    fn file_hidden(&self, path: &Utf8Path) -> bool {
        hidden_by_suffix(path, HIDDEN_SUFFIXES)
    }

    fn project_runnable(&self, path: &Utf8Path) -> bool {
        !path.as_str().is_empty() && path.exists()
    }

    fn build(&self, project: &Utf8Path) -> Option<Invocation> {
        if Self::has_makefile(project) {
            Some(self.make().into())
        } else if relative_exists(project, "configure") {
            Some(
                ShellPipeline::new()
                    .then(CommandLine::new("./configure"))
                    .then(self.make())
                    .into(),
            )
        } else if relative_exists(project, "autogen.sh") {
            Some(
                ShellPipeline::new()
                    .then(CommandLine::new("./autogen.sh"))
                    .then(self.make())
                    .into(),
            )
        } else {
            None
        }
    }

    fn test(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(
            CommandLine::new("env")
                .args(&["CK_VERBOSITY=verbose", MAKE, "check"])
                .into(),
        )
    }

    fn run(&self, _project: &Utf8Path, path: &ShellArg, args: &[ShellArg]) -> Option<Invocation> {
        Some(run_binary(path, args))
    }

    fn clean(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(CommandLine::new(MAKE).arg("clean").into())
    }
}
