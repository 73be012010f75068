//! `edi` - command line front end for edi-core.
//!
//! Source control subcommands operate on the repository found above `--dir`
//! (default: the current directory); build subcommands operate on `--dir` itself.
//! Build output is streamed to the console and the process exits with the tool's
//! exit code. Exit code 2 means there was no repository or no recognized build system.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use edi_core::logging;
use edi_core::metrics::Metrics;
use edi_core::services::{
    BuildError, BuildRegistry, Builder, DiffOutcome, DiffStreamer, ExeService, LineSink,
    NotifyHub, OutputLine, OutputStream, RunningProcess, ScmError, ScmSession,
};
use edi_core::{APP_NAME, ConfigManager, EdiSettings, ScmOperation, VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const EXIT_UNAVAILABLE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "edi", version, about = "Source control and build orchestration for Edi projects")]
struct Cli {
    /// Project or repository directory
    #[arg(long, global = true)]
    dir: Option<Utf8PathBuf>,

    /// Directory holding `Edi Settings.yaml`
    #[arg(long, global = true, default_value = "Edi Data")]
    config: Utf8PathBuf,

    /// Debug logging, also echoed to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show changed files
    Status,
    /// Show the working tree or staged diff
    Diff {
        #[arg(long)]
        cached: bool,
    },
    Stage {
        path: String,
    },
    Unstage {
        path: String,
    },
    /// Remove a tracked file
    Rm {
        path: String,
    },
    Mv {
        src: String,
        dest: String,
    },
    Commit {
        #[arg(short, long)]
        message: String,
    },
    Push,
    Pull,
    Stash,
    /// Add `origin` and publish the current branch to it
    RemoteAdd {
        url: String,
    },
    /// Set user name and email for the repository
    Credentials {
        name: String,
        email: String,
    },
    /// Show the configured identity and remote
    Whoami,
    /// Print the build system detected for the project
    Detect,
    Build,
    Test,
    Clean,
    Run {
        path: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config)?;
    let settings = config_manager.load_settings()?.edi_settings;
    let debug = cli.debug || settings.debug_mode;

    let guard = logging::setup_logging_with_console(&settings.log_directory, "edi", debug, debug)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("edi-worker")
        .build()?;

    let metrics = Arc::new(Metrics::new());
    let result = runtime.block_on(dispatch(cli, settings, Arc::clone(&metrics)));

    metrics.log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("edi: {:#}", e);
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}

async fn dispatch(cli: Cli, settings: EdiSettings, metrics: Arc<Metrics>) -> Result<i32> {
    let dir = match cli.dir {
        Some(dir) => dir,
        None => Utf8PathBuf::try_from(std::env::current_dir()?)
            .context("Current directory is not valid UTF-8")?,
    };

    match cli.command {
        Command::Detect => detect(&dir, &settings),
        Command::Build => build(&dir, &settings, metrics, |b, sink| b.build(sink)).await,
        Command::Test => build(&dir, &settings, metrics, |b, sink| b.test(sink)).await,
        Command::Clean => build(&dir, &settings, metrics, |b, sink| b.clean(sink)).await,
        Command::Run { path, args } => {
            let args = shlex::try_join(args.iter().map(String::as_str))
                .context("Run arguments contain a NUL byte")?;
            build(&dir, &settings, metrics, |b, sink| b.run(&path, Some(&args), sink)).await
        }
        scm_command => {
            let runner = ExeService::new()
                .with_timeout(settings.command_timeout())
                .with_metrics(metrics);
            match ScmSession::open(&dir, None, Arc::new(runner)) {
                Ok(session) => scm(Arc::new(session), scm_command).await,
                Err(e @ ScmError::NotAvailable { .. }) => {
                    eprintln!("edi: {}", e);
                    Ok(EXIT_UNAVAILABLE)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

async fn scm(session: Arc<ScmSession>, command: Command) -> Result<i32> {
    let code = match command {
        Command::Status => {
            for record in session.status().await? {
                println!("{}", record);
            }
            0
        }
        Command::Diff { cached } => {
            let streamer = DiffStreamer::new();
            let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
            streamer.start(Arc::clone(&session), cached, tx).await;
            let printer = tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    println!("{}", line.text);
                }
            });
            let outcome = streamer.wait().await;
            printer.await?;
            match outcome {
                Some(DiffOutcome::Failed(e)) => {
                    eprintln!("edi: {}", e);
                    1
                }
                _ => 0,
            }
        }
        Command::Stage { path } => session.stage(&path).await?,
        Command::Unstage { path } => session.unstage(&path).await?,
        Command::Rm { path } => session.delete(&path).await?,
        Command::Mv { src, dest } => session.move_path(&src, &dest).await?,
        Command::Commit { message } => {
            background(&session, ScmOperation::Commit(message)).await?
        }
        Command::Push => background(&session, ScmOperation::Push).await?,
        Command::Pull => background(&session, ScmOperation::Pull).await?,
        Command::Stash => background(&session, ScmOperation::Stash).await?,
        Command::RemoteAdd { url } => session.remote_add(&url).await?,
        Command::Credentials { name, email } => session.credentials_set(&name, &email).await?,
        Command::Whoami => {
            let unset = || "(unset)".to_string();
            println!("name:   {}", session.remote_name().await?.unwrap_or_else(unset));
            println!("email:  {}", session.remote_email().await?.unwrap_or_else(unset));
            println!("remote: {}", session.remote_url().await?.unwrap_or_else(unset));
            println!("avatar: {}", session.avatar_url().await?.unwrap_or_else(unset));
            0
        }
        other => anyhow::bail!("{:?} is not a source control command", other),
    };
    Ok(code)
}

async fn background(session: &Arc<ScmSession>, operation: ScmOperation) -> Result<i32> {
    let mut events = session.state().subscribe();
    let code = session.run_operation(operation).await?;

    while let Ok(event) = events.try_recv() {
        tracing::debug!("{:?}", event);
    }
    Ok(code)
}

fn detect(dir: &Utf8Path, settings: &EdiSettings) -> Result<i32> {
    match Builder::from_settings(dir, settings).provider() {
        Ok(provider) => {
            println!("{}", provider.id());
            Ok(0)
        }
        Err(e) => {
            eprintln!("edi: {}", e);
            Ok(EXIT_UNAVAILABLE)
        }
    }
}

/// Start one build operation and echo its output until the process exits
async fn build<F>(
    dir: &Utf8Path,
    settings: &EdiSettings,
    metrics: Arc<Metrics>,
    start: F,
) -> Result<i32>
where
    F: FnOnce(&Builder, Option<LineSink>) -> Result<RunningProcess, BuildError>,
{
    let exe = ExeService::new()
        .with_timeout(settings.command_timeout())
        .with_environment(settings.build_environment.clone())
        .with_metrics(metrics);
    let builder = Builder::new(
        dir,
        BuildRegistry::builtin(settings),
        exe,
        NotifyHub::with_capacity(settings.notify_capacity),
    )
    .with_provider_override(settings.build_provider_override().map(str::to_string));

    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            match line.stream {
                OutputStream::Stdout => println!("{}", line.text),
                OutputStream::Stderr => eprintln!("{}", line.text),
            }
        }
    });

    let process = match start(&builder, Some(tx)) {
        Ok(process) => process,
        Err(e @ (BuildError::NoProvider(_) | BuildError::ToolNotInstalled { .. })) => {
            eprintln!("edi: {}", e);
            return Ok(EXIT_UNAVAILABLE);
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!("Started {} (pid {:?})", process.command(), process.pid());

    let code = process.wait().await?;
    printer.await?;
    Ok(code)
}
