//! Named completion channels.
//!
//! A streaming run started through [`ExeService::notify`](crate::services::exe::ExeService::notify)
//! publishes its exit code on a channel name. Anyone interested subscribes to that name
//! beforehand; an event published with no subscribers is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

pub const BUILD_CHANNEL: &str = "edi_build";
pub const TEST_CHANNEL: &str = "edi_test";
pub const CLEAN_CHANNEL: &str = "edi_clean";
pub const RUN_CHANNEL: &str = "edi_run";

const DEFAULT_CAPACITY: usize = 16;

/// Exit code of a finished run, tagged with its channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub channel: String,
    pub code: i32,
}

#[derive(Debug, Clone)]
pub struct NotifyHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<CompletionEvent>>>>,
    capacity: usize,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to completions on `channel`, creating it if needed
    pub fn listen(&self, channel: &str) -> broadcast::Receiver<CompletionEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an exit code; returns how many subscribers received it
    pub fn complete(&self, channel: &str, code: i32) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(channel) else {
            tracing::debug!("No listeners on {} for exit code {}", channel, code);
            return 0;
        };

        match sender.send(CompletionEvent {
            channel: channel.to_string(),
            code,
        }) {
            Ok(count) => count,
            Err(_) => {
                tracing::debug!("All listeners on {} have gone away", channel);
                0
            }
        }
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_receives_code() {
        let hub = NotifyHub::new();
        let mut rx = hub.listen(TEST_CHANNEL);

        assert_eq!(hub.complete(TEST_CHANNEL, 2), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            CompletionEvent {
                channel: TEST_CHANNEL.to_string(),
                code: 2,
            }
        );
    }

    #[test]
    fn test_no_listener_drops_event() {
        let hub = NotifyHub::new();
        assert_eq!(hub.complete(RUN_CHANNEL, 0), 0);

        let rx = hub.listen(RUN_CHANNEL);
        drop(rx);
        assert_eq!(hub.complete(RUN_CHANNEL, 0), 0);
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let hub = NotifyHub::new();
        let mut build = hub.listen(BUILD_CHANNEL);
        let mut clean = hub.listen(CLEAN_CHANNEL);

        hub.complete(CLEAN_CHANNEL, 1);

        assert_eq!(clean.recv().await.unwrap().code, 1);
        assert!(build.try_recv().is_err());
    }
}
