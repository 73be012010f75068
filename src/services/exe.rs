//! Subprocess executor.
//!
//! Every external tool invocation in the crate goes through this module. Commands are
//! described structurally ([`CommandLine`] is an argument vector, [`ShellPipeline`] is the
//! one place a shell is involved) and executed with the working directory scoped to the
//! child process, so concurrent callers never race on the process-wide cwd.
//!
//! Three execution modes are provided:
//! - **Blocking**: [`CommandRunner::wait`] awaits the exit status.
//! - **Captured**: [`CommandRunner::response`] collects stdout as a string.
//! - **Streaming**: [`ExeService::spawn_streaming`] forwards stdout/stderr lines to a
//!   [`LineSink`] as they arrive; [`ExeService::notify`] additionally publishes the exit
//!   code on a named [`NotifyHub`] channel.

use crate::metrics::Metrics;
use crate::services::notify::NotifyHub;
use async_trait::async_trait;
use camino::Utf8Path;
use indexmap::IndexMap;
use std::borrow::Cow;
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Errors that can occur while launching or waiting on a subprocess
#[derive(Error, Debug)]
pub enum ExeError {
    #[error("Argument contains a NUL byte: {0:?}")]
    NulByte(String),

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Process task failed: {0}")]
    Join(String),
}

/// A single argument that is safe to pass to a subprocess or interpolate into a shell.
///
/// Caller-supplied paths, URLs and names must be wrapped in a `ShellArg` before they can
/// reach a [`CommandLine`]. The raw value is handed to the child as one argv entry; the
/// [`quoted`](Self::quoted) form is what appears when the command is rendered for a shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShellArg(String);

impl ShellArg {
    pub fn new(raw: impl Into<String>) -> Result<Self, ExeError> {
        let raw = raw.into();
        if raw.contains('\0') {
            return Err(ExeError::NulByte(raw));
        }
        Ok(Self(raw))
    }

    fn literal(raw: &'static str) -> Self {
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shell-quoted form; tokenizes back to exactly [`as_str`](Self::as_str).
    pub fn quoted(&self) -> Cow<'_, str> {
        render_arg(&self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShellArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted())
    }
}

impl AsRef<str> for ShellArg {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn render_arg(arg: &str) -> Cow<'_, str> {
    let is_bare = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"_./:=@%+,-".contains(&b));
    if is_bare {
        return Cow::Borrowed(arg);
    }

    // ShellArg never holds NUL, the only input try_quote rejects
    shlex::try_quote(arg).unwrap_or(Cow::Borrowed("''"))
}

/// Structured command: a program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: ShellArg,
    args: Vec<ShellArg>,
}

impl CommandLine {
    pub fn new(program: &'static str) -> Self {
        Self {
            program: ShellArg::literal(program),
            args: Vec::new(),
        }
    }

    /// Command whose program is itself caller-supplied (e.g. a built binary).
    pub fn for_program(program: ShellArg) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    pub fn git() -> Self {
        Self::new("git")
    }

    pub fn arg(mut self, arg: &'static str) -> Self {
        self.args.push(ShellArg::literal(arg));
        self
    }

    pub fn args(mut self, args: &[&'static str]) -> Self {
        self.args.extend(args.iter().copied().map(ShellArg::literal));
        self
    }

    pub fn shell_arg(mut self, arg: &ShellArg) -> Self {
        self.args.push(arg.clone());
        self
    }

    pub fn shell_args(mut self, args: &[ShellArg]) -> Self {
        self.args.extend(args.iter().cloned());
        self
    }

    pub fn program(&self) -> &str {
        self.program.as_str()
    }

    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(ShellArg::as_str)
    }

    /// Render as a single shell command string with every argument quoted as needed.
    pub fn to_shell_string(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| a.quoted())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(self.program.as_str());
        cmd.args(self.arguments());
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// `&&`-chained sequence of commands executed through the platform shell.
///
/// Only used where a compound step is unavoidable (configure-then-make, `cd build && ...`).
/// Each step is a [`CommandLine`], so every interpolated value is still quoted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellPipeline {
    steps: Vec<String>,
}

impl ShellPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: CommandLine) -> Self {
        self.steps.push(step.to_shell_string());
        self
    }

    pub fn script(&self) -> String {
        self.steps.join(" && ")
    }

    fn to_command(&self) -> Command {
        if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", &self.script()]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", &self.script()]);
            c
        }
    }
}

/// Anything the executor can launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Direct(CommandLine),
    Shell(ShellPipeline),
}

impl Invocation {
    pub fn to_shell_string(&self) -> String {
        match self {
            Invocation::Direct(command) => command.to_shell_string(),
            Invocation::Shell(pipeline) => pipeline.script(),
        }
    }

    fn to_command(&self) -> Command {
        match self {
            Invocation::Direct(command) => command.to_command(),
            Invocation::Shell(pipeline) => pipeline.to_command(),
        }
    }
}

impl From<CommandLine> for Invocation {
    fn from(command: CommandLine) -> Self {
        Invocation::Direct(command)
    }
}

impl From<ShellPipeline> for Invocation {
    fn from(pipeline: ShellPipeline) -> Self {
        Invocation::Shell(pipeline)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of output from a streaming run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }
}

/// Receiver end is owned by whoever presents output (console, log panel).
pub type LineSink = mpsc::UnboundedSender<OutputLine>;

/// Blocking and captured execution, the seam SCM backends are written against.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion in `cwd` and return the exit code.
    async fn wait(&self, command: &CommandLine, cwd: &Utf8Path) -> Result<i32, ExeError>;

    /// Run to completion in `cwd` and return stdout with one trailing newline removed.
    ///
    /// An empty string is a legitimate answer (clean tree, unset config value).
    async fn response(&self, command: &CommandLine, cwd: &Utf8Path) -> Result<String, ExeError>;
}

/// A streaming subprocess that is still running.
///
/// The exit status is observed exactly once, by the task behind this handle.
#[derive(Debug)]
pub struct RunningProcess {
    pid: Option<u32>,
    command: String,
    handle: JoinHandle<Result<i32, ExeError>>,
}

impl RunningProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wait for the process and its output forwarding to finish.
    pub async fn wait(self) -> Result<i32, ExeError> {
        self.handle
            .await
            .map_err(|e| ExeError::Join(e.to_string()))?
    }
}

/// Default [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ExeService {
    metrics: Arc<Metrics>,
    timeout: Option<Duration>,
    environment: IndexMap<String, String>,
}

impl ExeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit blocking and captured runs. Streaming runs are never timed out.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra environment for streaming runs.
    pub fn with_environment(mut self, environment: IndexMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Check whether an executable is available on `PATH`.
    pub fn tool_installed(tool: &str) -> bool {
        which::which(tool).is_ok()
    }

    async fn output(
        &self,
        invocation: &Invocation,
        cwd: &Utf8Path,
    ) -> Result<std::process::Output, ExeError> {
        let rendered = invocation.to_shell_string();
        tracing::info!("Executing in {}: {}", cwd, rendered);

        let start = Instant::now();

        let mut cmd = invocation.to_command();
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| {
            self.metrics.record_command_failed();
            ExeError::Spawn {
                command: rendered.clone(),
                source,
            }
        })?;

        let output = match self.timeout {
            Some(limit) => timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    tracing::warn!("`{}` timed out after {:?}", rendered, limit);
                    self.metrics.record_command_failed();
                    ExeError::Timeout(limit)
                })??,
            None => child.wait_with_output().await?,
        };

        let duration = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);
        self.metrics.record_command(duration, exit_code == 0);

        if exit_code != 0 {
            tracing::debug!(
                "`{}` exited with {}: {}",
                rendered,
                exit_code,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }

        tracing::debug!(
            "`{}` completed in {:.2}s with exit code {}",
            rendered,
            duration.as_secs_f32(),
            exit_code
        );

        Ok(output)
    }

    /// Blocking run of any invocation, pipelines included.
    pub async fn wait_invocation(
        &self,
        invocation: &Invocation,
        cwd: &Utf8Path,
    ) -> Result<i32, ExeError> {
        let output = self.output(invocation, cwd).await?;
        Ok(output.status.code().unwrap_or(-1))
    }

    /// Captured run of any invocation, pipelines included.
    pub async fn response_invocation(
        &self,
        invocation: &Invocation,
        cwd: &Utf8Path,
    ) -> Result<String, ExeError> {
        let output = self.output(invocation, cwd).await?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }

    /// Start a process whose output lines are forwarded to `sink` as they arrive.
    pub fn spawn_streaming(
        &self,
        invocation: &Invocation,
        cwd: &Utf8Path,
        sink: Option<LineSink>,
    ) -> Result<RunningProcess, ExeError> {
        self.spawn_streaming_inner(invocation, cwd, sink, None)
    }

    /// Streaming run whose exit code is published on `channel` once the process ends.
    pub fn notify(
        &self,
        hub: &NotifyHub,
        channel: &str,
        invocation: &Invocation,
        cwd: &Utf8Path,
        sink: Option<LineSink>,
    ) -> Result<RunningProcess, ExeError> {
        self.spawn_streaming_inner(
            invocation,
            cwd,
            sink,
            Some((hub.clone(), channel.to_string())),
        )
    }

    fn spawn_streaming_inner(
        &self,
        invocation: &Invocation,
        cwd: &Utf8Path,
        sink: Option<LineSink>,
        completion: Option<(NotifyHub, String)>,
    ) -> Result<RunningProcess, ExeError> {
        let rendered = invocation.to_shell_string();
        tracing::info!("Streaming in {}: {}", cwd, rendered);

        let mut cmd = invocation.to_command();
        cmd.current_dir(cwd)
            .envs(&self.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| {
            self.metrics.record_command_failed();
            ExeError::Spawn {
                command: rendered.clone(),
                source,
            }
        })?;
        self.metrics.record_streaming_run();

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .map(|out| forward_lines(out, OutputStream::Stdout, sink.clone()));
        let stderr = child
            .stderr
            .take()
            .map(|err| forward_lines(err, OutputStream::Stderr, sink));

        let metrics = Arc::clone(&self.metrics);
        let command = rendered.clone();
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            let status = child.wait().await;

            // drain both pipes before reporting so listeners see complete output
            for forwarder in [stdout, stderr].into_iter().flatten() {
                let _ = forwarder.await;
            }

            let exit_code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    tracing::warn!("Failed to wait for `{}`: {}", command, e);
                    metrics.record_command_failed();
                    if let Some((hub, channel)) = &completion {
                        hub.complete(channel, -1);
                    }
                    return Err(ExeError::ProcessError(e));
                }
            };
            metrics.record_command(start.elapsed(), exit_code == 0);

            tracing::info!(
                "`{}` finished in {:.2}s with exit code {}",
                command,
                start.elapsed().as_secs_f32(),
                exit_code
            );

            if let Some((hub, channel)) = &completion {
                hub.complete(channel, exit_code);
            }

            Ok(exit_code)
        });

        Ok(RunningProcess {
            pid,
            command: rendered,
            handle,
        })
    }
}

fn forward_lines<R>(reader: R, stream: OutputStream, sink: Option<LineSink>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        // bytes, not `lines()`: a non-UTF-8 line must not stop draining the pipe
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Stopped reading {:?}: {}", stream, e);
                    break;
                }
            }

            let Some(sink) = &sink else { continue };
            let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let text = String::from_utf8_lossy(line).into_owned();
            // a dropped receiver just means nobody is watching any more
            let _ = sink.send(OutputLine { stream, text });
        }
    })
}

#[async_trait]
impl CommandRunner for ExeService {
    async fn wait(&self, command: &CommandLine, cwd: &Utf8Path) -> Result<i32, ExeError> {
        self.wait_invocation(&Invocation::Direct(command.clone()), cwd)
            .await
    }

    async fn response(&self, command: &CommandLine, cwd: &Utf8Path) -> Result<String, ExeError> {
        self.response_invocation(&Invocation::Direct(command.clone()), cwd)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn temp_cwd() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn sh(script: &'static str) -> Invocation {
        CommandLine::new("sh").args(&["-c", script]).into()
    }

    #[test]
    fn test_shell_arg_rejects_nul() {
        assert!(matches!(
            ShellArg::new("bad\0path"),
            Err(ExeError::NulByte(_))
        ));
    }

    #[test]
    fn test_render_plain_arguments_unquoted() {
        let cmd = CommandLine::git().args(&["status", "--porcelain"]);
        assert_eq!(cmd.to_shell_string(), "git status --porcelain");

        let cmd = CommandLine::new("cmake").args(&["-DCMAKE_EXPORT_COMPILE_COMMANDS=1", ".."]);
        assert_eq!(cmd.to_shell_string(), "cmake -DCMAKE_EXPORT_COMPILE_COMMANDS=1 ..");
    }

    #[test]
    fn test_render_hostile_path_is_one_token() {
        for raw in ["it's here.txt", "a b", "$(rm -rf ~)", "x;echo pwned", "back`tick`", ""] {
            let arg = ShellArg::new(raw).unwrap();
            let cmd = CommandLine::git().arg("add").shell_arg(&arg);
            let tokens = shlex::split(&cmd.to_shell_string()).unwrap();
            assert_eq!(tokens, vec!["git".to_string(), "add".to_string(), raw.to_string()]);
        }
    }

    #[test]
    fn test_pipeline_script() {
        let pipeline = ShellPipeline::new()
            .then(CommandLine::new("./configure"))
            .then(CommandLine::new("make"));
        assert_eq!(pipeline.script(), "./configure && make");
    }

    #[tokio::test]
    async fn test_wait_reports_exit_codes() {
        let (_dir, cwd) = temp_cwd();
        let exe = ExeService::new();

        assert_eq!(exe.wait(&CommandLine::new("true"), &cwd).await.unwrap(), 0);
        assert_ne!(exe.wait(&CommandLine::new("false"), &cwd).await.unwrap(), 0);
        assert_eq!(exe.wait_invocation(&sh("exit 7"), &cwd).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_response_trims_single_newline() {
        let (_dir, cwd) = temp_cwd();
        let exe = ExeService::new();

        let text = exe
            .response_invocation(&sh("printf 'one\\ntwo\\n\\n'"), &cwd)
            .await
            .unwrap();
        assert_eq!(text, "one\ntwo\n");

        let empty = exe.response_invocation(&sh("true"), &cwd).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_runs_in_requested_directory() {
        let (_dir, cwd) = temp_cwd();
        std::fs::write(cwd.join("marker.txt"), "x").unwrap();

        let exe = ExeService::new();
        let listing = exe
            .response(&CommandLine::new("ls"), &cwd)
            .await
            .unwrap();
        assert!(listing.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let (_dir, cwd) = temp_cwd();
        let exe = ExeService::new();
        let result = exe
            .wait(&CommandLine::new("definitely-not-a-real-tool-xyz"), &cwd)
            .await;
        assert!(matches!(result, Err(ExeError::Spawn { .. })));
        assert_eq!(exe.metrics().commands_failed(), 1);
    }

    #[tokio::test]
    async fn test_timeout() {
        let (_dir, cwd) = temp_cwd();
        let exe = ExeService::new().with_timeout(Some(Duration::from_millis(100)));
        let result = exe.wait_invocation(&sh("sleep 5"), &cwd).await;
        assert!(matches!(result, Err(ExeError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_streaming_forwards_both_streams() {
        let (_dir, cwd) = temp_cwd();
        let exe = ExeService::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let running = exe
            .spawn_streaming(&sh("echo out; echo err 1>&2; exit 3"), &cwd, Some(tx))
            .unwrap();
        assert_eq!(running.wait().await.unwrap(), 3);

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert!(lines.contains(&OutputLine::stdout("out")));
        assert!(lines.contains(&OutputLine {
            stream: OutputStream::Stderr,
            text: "err".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_streaming_survives_non_utf8_output() {
        let (_dir, cwd) = temp_cwd();
        let exe = ExeService::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let script = "printf 'caf\\351\\n'; i=0; \
                      while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done; exit 0";

        let running = exe.spawn_streaming(&sh(script), &cwd, Some(tx)).unwrap();
        assert_eq!(running.wait().await.unwrap(), 0);

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line.text);
        }
        assert_eq!(lines.len(), 20001);
        assert_eq!(lines[0], "caf\u{FFFD}");
        assert_eq!(lines[20000], "line 19999");
    }

    #[tokio::test]
    async fn test_streaming_without_sink_drains_non_utf8() {
        let (_dir, cwd) = temp_cwd();
        let script = "printf '\\377\\n'; i=0; \
                      while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done; exit 4";

        let running = ExeService::new()
            .spawn_streaming(&sh(script), &cwd, None)
            .unwrap();
        assert_eq!(running.wait().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_streaming_environment() {
        let (_dir, cwd) = temp_cwd();
        let mut env = IndexMap::new();
        env.insert("EDI_TEST_VALUE".to_string(), "hello".to_string());
        let exe = ExeService::new().with_environment(env);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let running = exe
            .spawn_streaming(&sh("echo $EDI_TEST_VALUE"), &cwd, Some(tx))
            .unwrap();
        assert_eq!(running.wait().await.unwrap(), 0);
        assert_eq!(rx.try_recv().unwrap().text, "hello");
    }

    #[tokio::test]
    async fn test_notify_publishes_exit_code() {
        let (_dir, cwd) = temp_cwd();
        let exe = ExeService::new();
        let hub = NotifyHub::new();
        let mut listener = hub.listen("edi_build");

        let running = exe
            .notify(&hub, "edi_build", &sh("exit 5"), &cwd, None)
            .unwrap();
        assert_eq!(running.wait().await.unwrap(), 5);

        let event = listener.recv().await.unwrap();
        assert_eq!(event.channel, "edi_build");
        assert_eq!(event.code, 5);
    }
}
