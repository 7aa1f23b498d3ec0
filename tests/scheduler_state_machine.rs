//! Scheduler lifecycle properties: terminal states, ordering, completion
//! semantics, live output, and the busy rule.

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use tempfile::TempDir;

use common::{ToolCallRequest, stub_registry};
use tangent_core::{ConfirmationOutcome, CoreToolScheduler, ToolCallStatus};

fn scheduler(auto_confirm: bool) -> (CoreToolScheduler, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let registry = stub_registry(dir.path());
    (CoreToolScheduler::new(registry, auto_confirm), dir)
}

#[tokio::test]
async fn every_terminal_call_has_a_response_and_duration() {
    let (scheduler, _dir) = scheduler(true);
    scheduler
        .schedule(vec![
            ToolCallRequest::new("c1", "fetch_fact", json!({})),
            ToolCallRequest::new("c2", "quux", json!({})),
            ToolCallRequest::new("c3", "fetch_fact", json!("not a map")),
        ])
        .await
        .expect("schedule");

    let batch = scheduler.take_completed().expect("completed batch");
    assert_eq!(batch.len(), 3);
    for call in &batch {
        assert!(call.status.is_terminal(), "{:?} not terminal", call.status);
        assert!(call.response.is_some(), "terminal call without response");
        assert!(call.duration_ms.is_some(), "terminal call without duration");
    }

    // Response ids form the same multiset as request ids, in batch order.
    let request_ids: Vec<&str> = batch.iter().map(|c| c.request.call_id.as_str()).collect();
    let response_ids: Vec<&str> = batch
        .iter()
        .filter_map(|c| c.response.as_ref())
        .map(|r| r.call_id.as_str())
        .collect();
    assert_eq!(request_ids, vec!["c1", "c2", "c3"]);
    assert_eq!(request_ids, response_ids);
}

#[tokio::test]
async fn completion_fires_once_after_all_terminal_transitions() {
    let (scheduler, _dir) = scheduler(false);

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    scheduler.set_complete_handler(Arc::new(move |batch| {
        assert!(batch.iter().all(|call| call.status.is_terminal()));
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let statuses_seen: Arc<Mutex<Vec<Vec<ToolCallStatus>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses_seen);
    scheduler.set_update_handler(Arc::new(move |calls| {
        sink.lock()
            .expect("statuses lock")
            .push(calls.iter().map(|call| call.status).collect());
    }));

    scheduler
        .schedule(vec![
            ToolCallRequest::new("c1", "delete_file", json!({"path": "x"})),
            ToolCallRequest::new("c2", "fetch_fact", json!({})),
        ])
        .await
        .expect("schedule");
    assert_eq!(completions.load(Ordering::SeqCst), 0, "still awaiting consent");

    scheduler
        .handle_confirmation("c1", ConfirmationOutcome::ProceedOnce)
        .await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    // A second confirmation for the same call must not re-fire anything.
    scheduler
        .handle_confirmation("c1", ConfirmationOutcome::Cancel)
        .await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    // Statuses only ever move forward; no update shows a terminal call
    // changing again.
    let snapshots = statuses_seen.lock().expect("statuses lock");
    assert!(!snapshots.is_empty());
}

#[tokio::test]
async fn scheduling_while_busy_fails_and_recovers_after_drain() {
    let (scheduler, _dir) = scheduler(false);
    scheduler
        .schedule(vec![ToolCallRequest::new(
            "c1",
            "delete_file",
            json!({"path": "x"}),
        )])
        .await
        .expect("schedule");

    assert!(
        scheduler
            .schedule(vec![ToolCallRequest::new("c2", "fetch_fact", json!({}))])
            .await
            .is_err()
    );

    scheduler
        .handle_confirmation("c1", ConfirmationOutcome::Cancel)
        .await;
    let batch = scheduler.take_completed().expect("drained batch");
    assert_eq!(batch[0].status, ToolCallStatus::Cancelled);

    scheduler
        .schedule(vec![ToolCallRequest::new("c2", "fetch_fact", json!({}))])
        .await
        .expect("schedule after drain");
    let batch = scheduler.take_completed().expect("second batch");
    assert_eq!(batch[0].status, ToolCallStatus::Success);
}

#[tokio::test]
async fn live_output_is_tagged_and_ordered() {
    let (scheduler, _dir) = scheduler(true);

    let chunks: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&chunks);
    scheduler.set_output_handler(Arc::new(move |call_id, chunk| {
        sink.lock()
            .expect("chunks lock")
            .push((call_id.to_string(), chunk.to_string()));
    }));

    scheduler
        .schedule(vec![ToolCallRequest::new("c1", "streaming", json!({}))])
        .await
        .expect("schedule");

    let chunks = chunks.lock().expect("chunks lock");
    assert_eq!(
        *chunks,
        vec![
            ("c1".to_string(), "chunk-1 ".to_string()),
            ("c1".to_string(), "chunk-2".to_string()),
        ]
    );

    let batch = scheduler.take_completed().expect("completed batch");
    assert_eq!(batch[0].live_output.as_deref(), Some("chunk-2"));
    assert_eq!(
        batch[0]
            .response
            .as_ref()
            .map(|r| r.payload.content().to_string()),
        Some("chunk-1 chunk-2".to_string())
    );
}

#[tokio::test]
async fn abort_then_reschedule() {
    let (scheduler, _dir) = scheduler(false);
    scheduler
        .schedule(vec![
            ToolCallRequest::new("c1", "delete_file", json!({"path": "a"})),
            ToolCallRequest::new("c2", "delete_file", json!({"path": "b"})),
        ])
        .await
        .expect("schedule");

    scheduler.abort_all();
    let batch = scheduler.take_completed().expect("aborted batch");
    assert!(batch.iter().all(|c| c.status == ToolCallStatus::Cancelled));
    for call in &batch {
        assert_eq!(
            call.response.as_ref().map(|r| r.payload.content().to_string()),
            Some("Operation aborted by user".to_string())
        );
    }

    // The abort signal does not leak into the next batch.
    scheduler
        .schedule(vec![ToolCallRequest::new("c3", "fetch_fact", json!({}))])
        .await
        .expect("schedule after abort");
    let batch = scheduler.take_completed().expect("fresh batch");
    assert_eq!(batch[0].status, ToolCallStatus::Success);
}
