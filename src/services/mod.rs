//! Services - external tool orchestration.
//!
//! # Components
//!
//! - [`exe`]: subprocess executor (blocking, captured and streaming runs) and the
//!   structured command types every other service builds commands with
//! - [`notify`]: named completion channels carrying exit codes of streaming runs
//! - [`path`]: repository root discovery and small path predicates
//! - [`scm`]: source control backend, status parser and session
//! - [`build`]: build system providers, detection registry and [`Builder`]
//!
//! Services are framework-agnostic: they know nothing about how output is presented and
//! report results as exit codes, parsed records and [`StateChange`](crate::state::StateChange)
//! events.

pub mod build;
pub mod exe;
pub mod notify;
pub mod path;
pub mod scm;

pub use build::{BuildError, BuildOperation, BuildProvider, BuildRegistry, Builder};
pub use exe::{
    CommandLine, CommandRunner, ExeError, ExeService, Invocation, LineSink, OutputLine,
    OutputStream, RunningProcess, ShellArg, ShellPipeline,
};
pub use notify::{CompletionEvent, NotifyHub};
pub use path::{PathOptions, find_marker_root, path_append, relative_exists};
pub use scm::{DiffOutcome, DiffStreamer, GitEngine, ScmEngine, ScmError, ScmSession, ScmSlot};
