use super::session::ScmSession;
use crate::services::exe::{LineSink, OutputLine};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEFAULT_CHUNK_LINES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Completed { lines: usize },
    Cancelled { lines: usize },
    Failed(String),
}

struct DiffTask {
    token: CancellationToken,
    handle: JoinHandle<DiffOutcome>,
}

impl DiffTask {
    async fn join(self) -> DiffOutcome {
        self.handle
            .await
            .unwrap_or_else(|e| DiffOutcome::Failed(e.to_string()))
    }
}

/// Streams diff text into a line sink, one request at a time.
///
/// Starting a new request cancels the running one and waits for it to stop before the
/// new task is spawned, so two tasks never write to the sink at once.
pub struct DiffStreamer {
    current: Mutex<Option<DiffTask>>,
    chunk_lines: usize,
}

impl DiffStreamer {
    pub fn new() -> Self {
        Self::with_chunk_lines(DEFAULT_CHUNK_LINES)
    }

    pub fn with_chunk_lines(chunk_lines: usize) -> Self {
        Self {
            current: Mutex::new(None),
            chunk_lines: chunk_lines.max(1),
        }
    }

    /// Start streaming `git diff [--cached]`. Returns the outcome of the request it replaced.
    pub async fn start(
        &self,
        session: Arc<ScmSession>,
        cached: bool,
        sink: LineSink,
    ) -> Option<DiffOutcome> {
        let mut current = self.current.lock().await;

        let previous = match current.take() {
            Some(task) => {
                task.token.cancel();
                Some(task.join().await)
            }
            None => None,
        };

        let token = CancellationToken::new();
        let handle = tokio::spawn(stream_diff(
            session,
            cached,
            sink,
            token.clone(),
            self.chunk_lines,
        ));
        *current = Some(DiffTask { token, handle });

        previous
    }

    /// Cancel the running request, if any, and wait for it to stop
    pub async fn cancel(&self) -> Option<DiffOutcome> {
        let task = self.current.lock().await.take()?;
        task.token.cancel();
        Some(task.join().await)
    }

    /// Wait for the running request to finish on its own
    pub async fn wait(&self) -> Option<DiffOutcome> {
        let task = self.current.lock().await.take()?;
        Some(task.join().await)
    }
}

impl Default for DiffStreamer {
    fn default() -> Self {
        Self::new()
    }
}

async fn stream_diff(
    session: Arc<ScmSession>,
    cached: bool,
    sink: LineSink,
    token: CancellationToken,
    chunk_lines: usize,
) -> DiffOutcome {
    let text = tokio::select! {
        _ = token.cancelled() => return DiffOutcome::Cancelled { lines: 0 },
        result = session.diff(cached) => match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Diff failed: {}", e);
                return DiffOutcome::Failed(e.to_string());
            }
        },
    };

    let lines: Vec<&str> = text.lines().collect();
    let mut sent = 0;

    for chunk in lines.chunks(chunk_lines) {
        if token.is_cancelled() {
            tracing::debug!("Diff superseded after {} lines", sent);
            return DiffOutcome::Cancelled { lines: sent };
        }
        for line in chunk {
            if sink.send(OutputLine::stdout(*line)).is_err() {
                return DiffOutcome::Cancelled { lines: sent };
            }
            sent += 1;
        }
        tokio::task::yield_now().await;
    }

    DiffOutcome::Completed { lines: sent }
}
