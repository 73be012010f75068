use super::status::{parse_line, parse_porcelain};
use super::{ScmEngine, ScmError};
use crate::models::{StatusCode, StatusRecord};
use crate::services::exe::{CommandLine, CommandRunner, ExeService, ShellArg};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

/// [`ScmEngine`] driving the `git` command line inside one repository root
pub struct GitEngine {
    root: Utf8PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl GitEngine {
    pub const NAME: &'static str = "git";
    pub const DIRECTORY: &'static str = ".git";

    pub fn new(root: impl Into<Utf8PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    pub fn installed() -> bool {
        ExeService::tool_installed(Self::NAME)
    }

    /// `git init .` in `dir`. Does nothing when git is not installed.
    pub async fn init_repo(runner: &dyn CommandRunner, dir: &Utf8Path) -> Result<i32, ScmError> {
        if !Self::installed() {
            tracing::warn!("git is not installed, not initializing {}", dir);
            return Ok(-1);
        }
        Ok(runner
            .wait(&CommandLine::git().args(&["init", "."]), dir)
            .await?)
    }

    /// `git clone <url> <dir>` run from `cwd`
    pub async fn clone_repo(
        runner: &dyn CommandRunner,
        url: &ShellArg,
        dir: &ShellArg,
        cwd: &Utf8Path,
    ) -> Result<i32, ScmError> {
        let command = CommandLine::git()
            .arg("clone")
            .shell_arg(url)
            .shell_arg(dir);
        Ok(runner.wait(&command, cwd).await?)
    }

    async fn exec(&self, command: CommandLine) -> Result<i32, ScmError> {
        Ok(self.runner.wait(&command, &self.root).await?)
    }

    async fn lookup(&self, command: CommandLine) -> Result<Option<String>, ScmError> {
        let value = self.runner.response(&command, &self.root).await?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    fn status_of(path: &ShellArg) -> CommandLine {
        CommandLine::git()
            .args(&["status", "--porcelain"])
            .shell_arg(path)
    }
}

#[async_trait]
impl ScmEngine for GitEngine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn directory(&self) -> &'static str {
        Self::DIRECTORY
    }

    fn root(&self) -> &Utf8Path {
        &self.root
    }

    async fn stage(&self, path: &ShellArg) -> Result<i32, ScmError> {
        self.exec(CommandLine::git().arg("add").shell_arg(path))
            .await
    }

    async fn unstage(&self, path: &ShellArg) -> Result<i32, ScmError> {
        // a directory matches many entries, any staged one needs the command
        let output = self
            .runner
            .response(&Self::status_of(path), &self.root)
            .await?;
        if !parse_porcelain(&output, &self.root).iter().any(|r| r.staged) {
            tracing::debug!("{} has nothing staged", path);
            return Ok(0);
        }

        // without a remote there may be no HEAD to reset against
        let command = if self.remote_url().await?.is_some() {
            CommandLine::git().args(&["reset", "HEAD"]).shell_arg(path)
        } else {
            CommandLine::git().args(&["rm", "--cached"]).shell_arg(path)
        };
        self.exec(command).await
    }

    async fn delete(&self, path: &ShellArg) -> Result<i32, ScmError> {
        self.exec(CommandLine::git().arg("rm").shell_arg(path))
            .await
    }

    async fn move_path(&self, src: &ShellArg, dest: &ShellArg) -> Result<i32, ScmError> {
        self.exec(CommandLine::git().arg("mv").shell_arg(src).shell_arg(dest))
            .await
    }

    async fn commit(&self, message: &ShellArg) -> Result<i32, ScmError> {
        self.exec(CommandLine::git().args(&["commit", "-m"]).shell_arg(message))
            .await
    }

    async fn status(&self) -> Result<Vec<StatusRecord>, ScmError> {
        let output = self
            .runner
            .response(&CommandLine::git().args(&["status", "--porcelain"]), &self.root)
            .await?;
        let records = parse_porcelain(&output, &self.root);
        tracing::debug!("{} status records in {}", records.len(), self.root);
        Ok(records)
    }

    async fn file_status(&self, path: &ShellArg) -> Result<StatusCode, ScmError> {
        let output = self
            .runner
            .response(&Self::status_of(path), &self.root)
            .await?;

        Ok(output
            .lines()
            .find_map(|line| parse_line(line, &self.root))
            .map_or(StatusCode::None, |record| record.change))
    }

    async fn diff(&self, cached: bool) -> Result<String, ScmError> {
        let command = if cached {
            CommandLine::git().args(&["diff", "--cached"])
        } else {
            CommandLine::git().arg("diff")
        };
        Ok(self.runner.response(&command, &self.root).await?)
    }

    async fn push(&self) -> Result<i32, ScmError> {
        self.exec(CommandLine::git().arg("push")).await
    }

    async fn pull(&self) -> Result<i32, ScmError> {
        self.exec(CommandLine::git().arg("pull")).await
    }

    async fn stash(&self) -> Result<i32, ScmError> {
        self.exec(CommandLine::git().arg("stash")).await
    }

    async fn remote_add(&self, url: &ShellArg) -> Result<i32, ScmError> {
        let code = self
            .exec(CommandLine::git().args(&["remote", "add", "origin"]).shell_arg(url))
            .await?;
        if code != 0 {
            tracing::warn!("Adding remote {} failed with exit code {}", url, code);
            return Ok(code);
        }

        self.exec(CommandLine::git().args(&["push", "--set-upstream", "origin", "master"]))
            .await
    }

    async fn remote_name(&self) -> Result<Option<String>, ScmError> {
        self.lookup(CommandLine::git().args(&["config", "--get", "user.name"]))
            .await
    }

    async fn remote_email(&self) -> Result<Option<String>, ScmError> {
        self.lookup(CommandLine::git().args(&["config", "--get", "user.email"]))
            .await
    }

    async fn remote_url(&self) -> Result<Option<String>, ScmError> {
        self.lookup(CommandLine::git().args(&["remote", "get-url", "origin"]))
            .await
    }

    async fn credentials_set(&self, name: &ShellArg, email: &ShellArg) -> Result<i32, ScmError> {
        let code = self
            .exec(CommandLine::git().args(&["config", "user.name"]).shell_arg(name))
            .await?;
        if code != 0 {
            return Ok(code);
        }
        self.exec(CommandLine::git().args(&["config", "user.email"]).shell_arg(email))
            .await
    }
}
