//! End-to-end polling scenarios against the public API

use state_reconciler::{
    FetchError, Observation, Outcome, ReconcileError, ReconciliationRequest, TargetStatus,
    source_fn,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
#[error("service unavailable")]
struct Unavailable;

/// Fetch log plus the remaining script; `None` means "not found".
#[derive(Default)]
struct Script {
    results: VecDeque<Option<&'static str>>,
    fetched_at: Vec<Instant>,
}

fn scripted(
    results: &[Option<&'static str>],
) -> (
    Arc<Mutex<Script>>,
    impl state_reconciler::StatusSource<Entity = String, Error = Unavailable>,
) {
    let script = Arc::new(Mutex::new(Script {
        results: results.iter().copied().collect(),
        fetched_at: Vec::new(),
    }));
    let handle = Arc::clone(&script);
    let source = source_fn(move |id: String| {
        let script = Arc::clone(&handle);
        async move {
            let mut s = script.lock().unwrap();
            s.fetched_at.push(Instant::now());
            let next = if s.results.len() > 1 {
                s.results.pop_front().flatten()
            } else {
                s.results.front().copied().flatten()
            };
            match next {
                Some(status) => Ok(Observation::new(status, format!("{id}:{status}"))),
                None => Err(FetchError::<Unavailable>::NotFound),
            }
        }
    });
    (script, source)
}

fn interval() -> Duration {
    Duration::from_secs(3)
}

#[tokio::test(start_paused = true)]
async fn test_server_boot_reaches_active() {
    let (script, source) = scripted(&[Some("BUILD"), Some("BUILD"), Some("ACTIVE")]);
    let req = ReconciliationRequest::builder("srv-1", TargetStatus::status("ACTIVE"))
        .pending(["BUILD"])
        .timeout(Duration::from_secs(30 * 60))
        .poll_interval(interval())
        .build()
        .unwrap();

    let done = req.wait(&source).await.unwrap();

    assert_eq!(done.into_entity().as_deref(), Some("srv-1:ACTIVE"));
    let fetched_at = script.lock().unwrap().fetched_at.clone();
    assert_eq!(fetched_at.len(), 3);
    for pair in fetched_at.windows(2) {
        assert!(pair[1] - pair[0] >= interval());
    }
}

#[tokio::test(start_paused = true)]
async fn test_volume_detach_reaches_available() {
    let (_, source) = scripted(&[Some("in-use"), Some("detaching"), Some("available")]);
    let req = ReconciliationRequest::builder("vol-1", TargetStatus::status("available"))
        .pending(["in-use", "detaching"])
        .timeout(Duration::from_secs(10 * 60))
        .poll_interval(Duration::from_secs(2))
        .build()
        .unwrap();

    let done = req.wait(&source).await.unwrap();

    assert_eq!(done.status(), "available");
    assert_eq!(done.polls, 3);
}

#[tokio::test(start_paused = true)]
async fn test_error_status_during_boot_is_unexpected() {
    let (script, source) = scripted(&[Some("BUILD"), Some("ERROR"), Some("ACTIVE")]);
    let req = ReconciliationRequest::builder("srv-2", TargetStatus::status("ACTIVE"))
        .pending(["BUILD"])
        .timeout(Duration::from_secs(60))
        .poll_interval(interval())
        .build()
        .unwrap();

    let err = req.wait(&source).await.unwrap_err();

    assert!(
        matches!(&err, ReconcileError::UnexpectedState { status, .. } if status == "ERROR"),
        "got {err:?}"
    );
    assert_eq!(script.lock().unwrap().fetched_at.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_confirmed_by_not_found() {
    let (_, source) = scripted(&[Some("ACTIVE"), None]);
    let req = ReconciliationRequest::builder("srv-3", TargetStatus::Deleted)
        .pending(["ACTIVE"])
        .timeout(Duration::from_secs(60))
        .poll_interval(interval())
        .build()
        .unwrap();

    let done = req.wait(&source).await.unwrap();

    assert_eq!(done.outcome, Outcome::Deleted);
    assert_eq!(done.status(), "DELETED");
    assert_eq!(done.polls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_build_times_out_promptly() {
    let (_, source) = scripted(&[Some("BUILD")]);
    let req = ReconciliationRequest::builder("srv-4", TargetStatus::status("ACTIVE"))
        .pending(["BUILD"])
        .timeout(Duration::from_millis(50))
        .poll_interval(Duration::from_millis(10))
        .build()
        .unwrap();

    let start = Instant::now();
    let err = req.wait(&source).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err, ReconcileError::Timeout { .. }), "got {err:?}");
    assert_eq!(err.observed_status(), Some("BUILD"));
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed <= Duration::from_millis(60), "took {elapsed:?}");
}
