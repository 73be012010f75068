//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events on mutations
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple tasks
//! - Announces every finished operation, repeats included

use camino::Utf8PathBuf;
use edi_core::models::RemoteField;
use edi_core::services::ShellArg;
use edi_core::{StateChange, StateManager, StatusCode, StatusRecord};
use std::sync::Arc;
use tokio::time::{Duration, timeout};

fn record(path: &str, change: StatusCode) -> StatusRecord {
    StatusRecord {
        path: ShellArg::new(path).unwrap(),
        fullpath: Utf8PathBuf::from("/repo").join(path),
        unescaped: path.to_string(),
        orig_path: None,
        change,
        staged: change.is_staged(),
    }
}

async fn next(rx: &mut tokio::sync::broadcast::Receiver<StateChange>) -> StateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_status_refresh_event() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    state.replace_statuses(vec![
        record("a.c", StatusCode::ModifiedStaged),
        record("b.c", StatusCode::Untracked),
    ]);

    assert_eq!(
        next(&mut rx).await,
        StateChange::StatusRefreshed { total: 2, staged: 1 }
    );
}

#[tokio::test]
async fn test_identical_refresh_still_announced() {
    let state = StateManager::new();
    let mut rx = state.subscribe();

    state.replace_statuses(Vec::new());
    state.replace_statuses(Vec::new());

    for _ in 0..2 {
        assert_eq!(
            next(&mut rx).await,
            StateChange::StatusRefreshed { total: 0, staged: 0 }
        );
    }
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut receivers = vec![state.subscribe(), state.subscribe(), state.subscribe()];

    state.cache_remote(RemoteField::Url, "git@example.com:edi.git".to_string());

    for rx in &mut receivers {
        assert_eq!(
            next(rx).await,
            StateChange::RemoteChanged {
                url: Some("git@example.com:edi.git".to_string())
            }
        );
    }
}

#[tokio::test]
async fn test_credentials_invalidation_event() {
    let state = StateManager::new();
    state.cache_remote(RemoteField::Name, "Edi".to_string());
    state.cache_remote(RemoteField::Email, "edi@example.com".to_string());
    let mut rx = state.subscribe();

    state.invalidate_remote(&[RemoteField::Name, RemoteField::Email]);

    assert_eq!(
        next(&mut rx).await,
        StateChange::CredentialsChanged {
            name: None,
            email: None
        }
    );
    assert_eq!(state.cached_remote(RemoteField::Name), None);
}

#[tokio::test]
async fn test_repeated_operation_result_is_announced() {
    let state = StateManager::new();
    let mut rx = state.subscribe();

    for _ in 0..2 {
        state.begin_operation("push");
        state.finish_operation("push", 1);
    }

    for _ in 0..2 {
        assert_eq!(
            next(&mut rx).await,
            StateChange::OperationStarted { operation: "push" }
        );
        assert_eq!(
            next(&mut rx).await,
            StateChange::OperationFinished {
                operation: "push",
                code: 1
            }
        );
    }
}

#[tokio::test]
async fn test_reset_clears_and_announces() {
    let state = StateManager::new();
    state.replace_statuses(vec![record("a.c", StatusCode::Added)]);
    state.cache_remote(RemoteField::Url, "https://example.com/edi.git".to_string());
    let mut rx = state.subscribe();

    let changes = state.reset();

    assert_eq!(changes.last(), Some(&StateChange::SessionReset));
    assert!(state.statuses().is_empty());
    assert_eq!(state.cached_remote(RemoteField::Url), None);

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen, changes);
}

#[tokio::test]
async fn test_concurrent_refreshes_are_consistent() {
    let state = Arc::new(StateManager::new());
    let mut handles = Vec::new();

    for i in 0..10 {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let records = (0..=i)
                .map(|n| record(&format!("file{}.c", n), StatusCode::Modified))
                .collect();
            state.replace_statuses(records);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let snapshot = state.snapshot();
    assert_eq!(snapshot.status_generation, 10);
    // lists are replaced wholesale, never merged
    let len = snapshot.statuses.len();
    assert!((1..=10).contains(&len));
    assert!(
        snapshot
            .statuses
            .iter()
            .enumerate()
            .all(|(n, r)| r.unescaped == format!("file{}.c", n))
    );
}
