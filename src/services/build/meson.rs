use super::{BuildProvider, hidden_by_suffix, run_binary};
use crate::services::exe::{CommandLine, Invocation, ShellArg, ShellPipeline};
use crate::services::path::relative_exists;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Mutex, PoisonError};

const HIDDEN_SUFFIXES: &[&str] = &[
    ".o",
    ".so",
    ".lo",
    ".ninja",
    ".ninja_deps",
    ".ninja_log",
    "compile_commands.json",
    "meson-logs",
    "meson-private",
    "@exe",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct MesonDirs {
    basedir: Utf8PathBuf,
    fulldir: Utf8PathBuf,
}

/// meson + ninja projects.
///
/// The build directory is resolved once per project and reused until a different
/// project is asked about.
#[derive(Debug)]
pub struct MesonProvider {
    build_dir: String,
    dirs: Mutex<Option<MesonDirs>>,
}

impl MesonProvider {
    pub fn new(build_dir: &str) -> Self {
        let build_dir = match build_dir.trim() {
            "" => "build",
            dir => dir,
        };
        Self {
            build_dir: build_dir.to_string(),
            dirs: Mutex::new(None),
        }
    }

    fn dirs(&self, project: &Utf8Path) -> MesonDirs {
        let mut cached = self.dirs.lock().unwrap_or_else(PoisonError::into_inner);
        match cached.as_ref() {
            Some(dirs) if dirs.basedir.as_path() == project => dirs.clone(),
            _ => {
                let dirs = MesonDirs {
                    basedir: project.to_path_buf(),
                    fulldir: project.join(&self.build_dir),
                };
                tracing::debug!("meson build directory for {} is {}", project, dirs.fulldir);
                *cached = Some(dirs.clone());
                dirs
            }
        }
    }

    /// `build.ninja` exists in the project's build directory
    pub fn configured(&self, project: &Utf8Path) -> bool {
        self.dirs(project).fulldir.join("build.ninja").exists()
    }

    fn build_dir_arg(&self) -> Option<ShellArg> {
        match ShellArg::new(self.build_dir.clone()) {
            Ok(arg) => Some(arg),
            Err(e) => {
                tracing::warn!("Unusable meson build directory: {}", e);
                None
            }
        }
    }

    fn ninja(&self, target: Option<&'static str>) -> Option<CommandLine> {
        let mut command = CommandLine::new("ninja")
            .arg("-C")
            .shell_arg(&self.build_dir_arg()?);
        if let Some(target) = target {
            command = command.arg(target);
        }
        Some(command)
    }
}

impl BuildProvider for MesonProvider {
    fn id(&self) -> &'static str {
        "meson"
    }

    fn tool(&self) -> &'static str {
        "meson"
    }

    fn path_supported(&self, project: &Utf8Path) -> bool {
        relative_exists(project, "meson.build")
    }

    fn file_hidden(&self, path: &Utf8Path) -> bool {
        if path.as_str().is_empty() {
            return false;
        }
        if path.is_dir() && path.join("build.ninja").exists() {
            return true;
        }
        hidden_by_suffix(path, HIDDEN_SUFFIXES)
    }

    fn project_runnable(&self, path: &Utf8Path) -> bool {
        is_executable(path)
    }

    fn build(&self, project: &Utf8Path) -> Option<Invocation> {
        let ninja = self.ninja(None)?;
        if self.configured(project) {
            return Some(ninja.into());
        }

        let configure = CommandLine::new("meson").shell_arg(&self.build_dir_arg()?);
        Some(ShellPipeline::new().then(configure).then(ninja).into())
    }

    fn test(&self, _project: &Utf8Path) -> Option<Invocation> {
        self.ninja(Some("test")).map(Into::into)
    }

    fn run(&self, _project: &Utf8Path, path: &ShellArg, args: &[ShellArg]) -> Option<Invocation> {
        Some(run_binary(path, args))
    }

    fn clean(&self, _project: &Utf8Path) -> Option<Invocation> {
        self.ninja(Some("clean")).map(Into::into)
    }
}

#[cfg(unix)]
fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Utf8Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        fs::write(root.join("meson.build"), "project('x', 'c')\n").unwrap();
        (dir, root)
    }

    #[test]
    fn test_configure_step_only_until_configured() {
        let (_dir, root) = project();
        let provider = MesonProvider::new("build");

        assert_eq!(
            provider.build(&root).unwrap().to_shell_string(),
            "meson build && ninja -C build"
        );

        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/build.ninja"), "").unwrap();

        assert!(provider.configured(&root));
        assert_eq!(
            provider.build(&root).unwrap().to_shell_string(),
            "ninja -C build"
        );
    }

    #[test]
    fn test_test_and_clean_targets() {
        let (_dir, root) = project();
        let provider = MesonProvider::new("");

        assert_eq!(
            provider.test(&root).unwrap().to_shell_string(),
            "ninja -C build test"
        );
        assert_eq!(
            provider.clean(&root).unwrap().to_shell_string(),
            "ninja -C build clean"
        );
    }

    #[test]
    fn test_dirs_follow_project() {
        let (_a, first) = project();
        let (_b, second) = project();
        let provider = MesonProvider::new("out");

        assert_eq!(provider.dirs(&first).fulldir, first.join("out"));
        assert_eq!(provider.dirs(&second).fulldir, second.join("out"));
    }

    #[test]
    fn test_hidden_ninja_outputs() {
        let (_dir, root) = project();
        let build = root.join("build");
        fs::create_dir_all(&build).unwrap();
        fs::write(build.join("build.ninja"), "").unwrap();

        let provider = MesonProvider::new("build");
        assert!(provider.file_hidden(&build));
        assert!(provider.file_hidden(Utf8Path::new("x/meson-logs")));
        assert!(provider.file_hidden(Utf8Path::new("x/compile_commands.json")));
        assert!(provider.file_hidden(Utf8Path::new("x/app@exe")));
        assert!(!provider.file_hidden(&root.join("meson.build")));
    }

    #[cfg(unix)]
    #[test]
    fn test_runnable_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, root) = project();
        let binary = root.join("app");
        fs::write(&binary, "#!/bin/sh\n").unwrap();
        assert!(!MesonProvider::new("build").project_runnable(&binary));

        fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(MesonProvider::new("build").project_runnable(&binary));
    }
}
