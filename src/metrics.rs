// Execution metrics module
//
// Lightweight counters for subprocess and state activity

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Executor and session metrics
///
/// Uses atomic operations so the executor, background SCM tasks and the state
/// manager can all record into one shared instance without locking.
#[derive(Debug)]
pub struct Metrics {
    /// Commands that ran to completion (any exit code)
    pub commands_run: AtomicU64,

    /// Commands that exited non-zero, failed to spawn or timed out
    pub commands_failed: AtomicU64,

    /// Streaming runs started
    pub streaming_runs: AtomicU64,

    /// Total wall time of completed commands in milliseconds
    pub total_command_time_ms: AtomicU64,

    pub state_broadcasts: AtomicU64,

    /// Broadcasts with no live subscriber
    pub state_broadcast_errors: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            commands_run: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            streaming_runs: AtomicU64::new(0),
            total_command_time_ms: AtomicU64::new(0),
            state_broadcasts: AtomicU64::new(0),
            state_broadcast_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a command that ran to completion
    pub fn record_command(&self, duration: Duration, success: bool) {
        self.commands_run.fetch_add(1, Ordering::Relaxed);
        self.total_command_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        if !success {
            self.commands_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a command that never produced an exit status
    pub fn record_command_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_streaming_run(&self) {
        self.streaming_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast(&self) {
        self.state_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_state_broadcast_error(&self) {
        self.state_broadcast_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commands_run(&self) -> u64 {
        self.commands_run.load(Ordering::Relaxed)
    }

    pub fn commands_failed(&self) -> u64 {
        self.commands_failed.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average wall time per completed command in milliseconds
    pub fn avg_command_time_ms(&self) -> f64 {
        let total = self.total_command_time_ms.load(Ordering::Relaxed);
        let count = self.commands_run.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Execution Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Commands: {} run, {} failed, {} streaming",
            self.commands_run.load(Ordering::Relaxed),
            self.commands_failed.load(Ordering::Relaxed),
            self.streaming_runs.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total command time: {:.2}s (avg: {:.2}ms per command)",
            self.total_command_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_command_time_ms()
        );
        tracing::info!(
            "State broadcasts: {}, without subscribers: {}",
            self.state_broadcasts.load(Ordering::Relaxed),
            self.state_broadcast_errors.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
