use super::{BuildProvider, hidden_by_suffix, run_binary};
use crate::services::exe::{CommandLine, Invocation, ShellArg};
use crate::services::path::file_name;
use camino::Utf8Path;
use std::fs;

#[derive(Debug, Clone, Copy, Default)]
pub struct GoProvider;

impl GoProvider {
    fn has_go_source(project: &Utf8Path) -> bool {
        let Ok(entries) = fs::read_dir(project) else {
            return false;
        };

        entries.flatten().any(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.len() > ".go".len()
                && name.ends_with(".go")
                && entry.file_type().is_ok_and(|t| t.is_file())
        })
    }
}

impl BuildProvider for GoProvider {
    fn id(&self) -> &'static str {
        "go"
    }

    fn tool(&self) -> &'static str {
        "go"
    }

    fn path_supported(&self, project: &Utf8Path) -> bool {
        Self::has_go_source(project)
    }

    fn file_hidden(&self, path: &Utf8Path) -> bool {
        matches!(file_name(path), "_obj" | "target") || hidden_by_suffix(path, &[".so"])
    }

    fn project_runnable(&self, path: &Utf8Path) -> bool {
        !path.as_str().is_empty()
    }

    fn build(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(CommandLine::new("go").arg("build").into())
    }

    fn test(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(CommandLine::new("go").args(&["test", "-v", "./..."]).into())
    }

    /// `go run` for sources, direct execution for anything else
    fn run(&self, _project: &Utf8Path, path: &ShellArg, args: &[ShellArg]) -> Option<Invocation> {
        if path.as_str().ends_with(".go") {
            Some(
                CommandLine::new("go")
                    .arg("run")
                    .shell_arg(path)
                    .shell_args(args)
                    .into(),
            )
        } else {
            Some(run_binary(path, args))
        }
    }

    fn clean(&self, _project: &Utf8Path) -> Option<Invocation> {
        Some(CommandLine::new("go").arg("clean").into())
    }
}
