// crates/lake-indexer/tests/view_orchestrator.rs
// ============================================================================
// Module: View Orchestrator Tests
// Description: Readiness, overlap, panic containment, and loop lifecycle.
// Purpose: Validate the refresh orchestrator independent of any domain.
// ============================================================================

//! ## Overview
//! Drives [`View`] with scripted refreshers:
//! - Readiness latches after the first success only
//! - Refreshes of one view never overlap
//! - Panics are contained, counted, and the loop keeps ticking
//! - The loop stops on shutdown

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use lake_indexer::IndexerError;
use lake_indexer::NoopViewMetrics;
use lake_indexer::RefreshError;
use lake_indexer::RefreshOutcome;
use lake_indexer::RefreshReport;
use lake_indexer::Refresher;
use lake_indexer::View;
use lake_indexer::ViewMetrics;
use tokio::sync::watch;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// What the scripted refresher does on a given call.
#[derive(Clone, Copy)]
enum Step {
    Succeed,
    Fail,
    Panic,
}

struct Scripted {
    steps: Vec<Step>,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    hold: Duration,
}

impl Scripted {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            hold: Duration::ZERO,
        }
    }

    fn holding(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }
}

#[async_trait]
impl Refresher for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        match self.steps.get(call).copied().unwrap_or(Step::Succeed) {
            Step::Succeed => Ok(RefreshReport {
                rows_written: 1,
            }),
            Step::Fail => Err(RefreshError::Source("source unavailable".to_string())),
            Step::Panic => panic!("scripted panic"),
        }
    }
}

#[derive(Default)]
struct RecordingMetrics {
    outcomes: Mutex<Vec<RefreshOutcome>>,
    durations: AtomicUsize,
}

impl ViewMetrics for RecordingMetrics {
    fn record_refresh(&self, _view: &str, outcome: RefreshOutcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    fn record_duration(&self, _view: &str, _duration: Duration) {
        self.durations.fetch_add(1, Ordering::SeqCst);
    }
}

fn view(refresher: Scripted, metrics: Arc<RecordingMetrics>) -> View<Scripted> {
    View::new(refresher, Duration::from_secs(10), metrics).unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn zero_interval_is_rejected() {
    let err = View::new(Scripted::new(vec![]), Duration::ZERO, Arc::new(NoopViewMetrics))
        .err()
        .unwrap();
    assert!(matches!(err, IndexerError::Invalid(message) if message.contains("scripted")));
}

#[tokio::test]
async fn readiness_latches_after_first_success_only() {
    let metrics = Arc::new(RecordingMetrics::default());
    let view = view(Scripted::new(vec![Step::Fail, Step::Succeed, Step::Fail]), metrics.clone());

    assert!(view.refresh().await.is_err());
    assert!(!view.is_ready());

    view.refresh().await.unwrap();
    assert!(view.is_ready());

    assert!(view.refresh().await.is_err());
    assert!(view.is_ready(), "a later failure never resets readiness");
    view.wait_ready(Duration::from_millis(1)).await.unwrap();

    assert_eq!(
        *metrics.outcomes.lock().unwrap(),
        vec![RefreshOutcome::Error, RefreshOutcome::Success, RefreshOutcome::Error]
    );
    assert_eq!(metrics.durations.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn wait_ready_times_out_before_first_success() {
    let view = view(Scripted::new(vec![Step::Fail]), Arc::new(RecordingMetrics::default()));
    let err = view.wait_ready(Duration::from_secs(2)).await.unwrap_err();
    assert_eq!(err.to_string(), "timed out after 2000 ms waiting for view scripted");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_never_overlap() {
    let view = view(
        Scripted::new(vec![]).holding(Duration::from_millis(20)),
        Arc::new(RecordingMetrics::default()),
    );
    let handles: Vec<_> = (0 .. 4)
        .map(|_| {
            let view = view.clone();
            tokio::spawn(async move { view.refresh().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(view.refresher().calls.load(Ordering::SeqCst), 4);
    assert_eq!(view.refresher().max_running.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn safe_refresh_contains_panics() {
    let metrics = Arc::new(RecordingMetrics::default());
    let view = view(Scripted::new(vec![Step::Panic, Step::Succeed]), metrics.clone());

    let err = view.safe_refresh().await.unwrap_err();
    assert_eq!(err, RefreshError::Panicked("scripted panic".to_string()));
    assert!(!view.is_ready());

    view.safe_refresh().await.unwrap();
    assert!(view.is_ready());
    assert_eq!(
        *metrics.outcomes.lock().unwrap(),
        vec![RefreshOutcome::Panic, RefreshOutcome::Success]
    );
}

#[tokio::test(start_paused = true)]
async fn loop_survives_panics_and_stops_on_shutdown() {
    let metrics = Arc::new(RecordingMetrics::default());
    let view = view(Scripted::new(vec![Step::Panic, Step::Fail, Step::Succeed]), metrics.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = view.start(shutdown_rx);

    view.wait_ready(Duration::from_secs(60)).await.unwrap();
    assert!(view.refresher().calls.load(Ordering::SeqCst) >= 3);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
    let calls = view.refresher().calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(view.refresher().calls.load(Ordering::SeqCst), calls);

    let outcomes = metrics.outcomes.lock().unwrap().clone();
    assert_eq!(
        outcomes[.. 3],
        [RefreshOutcome::Panic, RefreshOutcome::Error, RefreshOutcome::Success]
    );
}

#[tokio::test(start_paused = true)]
async fn loop_refreshes_immediately_then_on_each_tick() {
    let view = view(Scripted::new(vec![]), Arc::new(RecordingMetrics::default()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = view.start(shutdown_rx);

    view.wait_ready(Duration::from_millis(1)).await.unwrap();
    assert_eq!(view.refresher().calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(view.refresher().calls.load(Ordering::SeqCst), 3);

    drop(shutdown_tx);
    handle.await.unwrap();
}
