// crates/lake-indexer/src/view.rs
// ============================================================================
// Module: View Refresh Orchestrator
// Description: Ticking, non-overlapping, panic-contained refresh loops.
// Purpose: Drive domain refreshers on a schedule and expose readiness.
// Dependencies: async-trait, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! A [`View`] owns one [`Refresher`] and runs it on a `tokio` interval. The
//! first refresh happens immediately; later ones follow each tick, with
//! missed ticks delayed rather than bursted.
//!
//! ## Invariants
//! - Refreshes of one view never overlap (guarded by an async mutex).
//! - A panic inside a refresh is contained to its task, logged, and counted;
//!   the loop continues on the next tick.
//! - Readiness latches after the first successful refresh and never resets.
//! - Failed refreshes leave the last successful snapshot in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::error::IndexerError;
use crate::error::StoreError;
use crate::metrics::RefreshOutcome;
use crate::metrics::ViewMetrics;
use crate::readiness::ReadinessError;
use crate::readiness::ReadinessGate;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by a refresh.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The external source failed.
    #[error("source error: {0}")]
    Source(String),
    /// The fetched snapshot failed a safety check; nothing was written.
    #[error("{0}")]
    Unsafe(String),
    /// A store write or read failed.
    #[error("{0}")]
    Store(String),
    /// A prerequisite view did not become ready.
    #[error("prerequisite not ready: {0}")]
    Prerequisite(String),
    /// The refresh panicked.
    #[error("refresh panicked: {0}")]
    Panicked(String),
    /// The refresh task was cancelled.
    #[error("refresh cancelled")]
    Cancelled,
}

impl From<ReadinessError> for RefreshError {
    fn from(error: ReadinessError) -> Self {
        Self::Prerequisite(error.to_string())
    }
}

// ============================================================================
// SECTION: Refresher
// ============================================================================

/// Summary of one successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshReport {
    /// Rows appended across all datasets.
    pub rows_written: usize,
}

/// One domain's fetch, validate, convert, and store cycle.
#[async_trait]
pub trait Refresher: Send + Sync + 'static {
    /// Stable view name used in logs and metrics.
    fn name(&self) -> &str;

    /// Runs one refresh.
    async fn refresh(&self) -> Result<RefreshReport, RefreshError>;
}

// ============================================================================
// SECTION: View
// ============================================================================

/// Shared view state.
struct ViewInner<R> {
    /// Domain refresher.
    refresher: R,
    /// Tick interval.
    interval: Duration,
    /// Readiness latch.
    gate: ReadinessGate,
    /// Serializes refreshes.
    refresh_lock: Mutex<()>,
    /// Metrics sink.
    metrics: Arc<dyn ViewMetrics>,
}

/// Scheduled refresh loop around a [`Refresher`].
pub struct View<R> {
    /// Shared state.
    inner: Arc<ViewInner<R>>,
}

impl<R> Clone for View<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Refresher> View<R> {
    /// Creates a view that refreshes every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Invalid`] when `interval` is zero.
    pub fn new(
        refresher: R,
        interval: Duration,
        metrics: Arc<dyn ViewMetrics>,
    ) -> Result<Self, IndexerError> {
        if interval.is_zero() {
            return Err(IndexerError::Invalid(format!(
                "refresh interval for view {} must be greater than zero",
                refresher.name()
            )));
        }
        let gate = ReadinessGate::new(refresher.name());
        Ok(Self {
            inner: Arc::new(ViewInner {
                refresher,
                interval,
                gate,
                refresh_lock: Mutex::new(()),
                metrics,
            }),
        })
    }

    /// Returns the view name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.refresher.name()
    }

    /// Returns the wrapped refresher.
    #[must_use]
    pub fn refresher(&self) -> &R {
        &self.inner.refresher
    }

    /// Returns a handle to this view's readiness latch.
    #[must_use]
    pub fn readiness(&self) -> ReadinessGate {
        self.inner.gate.clone()
    }

    /// Returns true after the first successful refresh.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.gate.is_ready()
    }

    /// Waits for the first successful refresh.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError`] on timeout.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), ReadinessError> {
        self.inner.gate.wait_ready(timeout).await
    }

    /// Runs one refresh, waiting for any in-flight refresh of this view.
    ///
    /// # Errors
    ///
    /// Returns the refresher's [`RefreshError`].
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let _guard = self.inner.refresh_lock.lock().await;
        let name = self.name();
        let started = Instant::now();
        debug!(view = name, "refresh started");
        let result = self.inner.refresher.refresh().await;
        let elapsed = started.elapsed();
        self.inner.metrics.record_duration(name, elapsed);
        match &result {
            Ok(report) => {
                self.inner.metrics.record_refresh(name, RefreshOutcome::Success);
                info!(
                    view = name,
                    rows = report.rows_written,
                    duration_ms = elapsed.as_millis(),
                    "refresh completed"
                );
                if self.inner.gate.mark_ready() {
                    info!(view = name, "view is now ready");
                }
            }
            Err(_) => self.inner.metrics.record_refresh(name, RefreshOutcome::Error),
        }
        result
    }

    /// Runs one refresh on its own task, containing panics.
    ///
    /// # Errors
    ///
    /// Returns the refresher's [`RefreshError`], [`RefreshError::Panicked`]
    /// when it panicked, or [`RefreshError::Cancelled`] when the task was
    /// aborted.
    pub async fn safe_refresh(&self) -> Result<RefreshReport, RefreshError> {
        let view = self.clone();
        let started = Instant::now();
        let result = match tokio::spawn(async move { view.refresh().await }).await {
            Ok(result) => result,
            Err(join) if join.is_panic() => {
                let message = panic_message(join.into_panic().as_ref());
                self.inner.metrics.record_duration(self.name(), started.elapsed());
                self.inner.metrics.record_refresh(self.name(), RefreshOutcome::Panic);
                error!(view = self.name(), panic = %message, "refresh panicked");
                return Err(RefreshError::Panicked(message));
            }
            Err(_) => Err(RefreshError::Cancelled),
        };
        if let Err(err) = &result {
            error!(view = self.name(), error = %err, "refresh failed");
        }
        result
    }

    /// Spawns the refresh loop; it stops when `shutdown` turns true or its
    /// sender is dropped.
    pub fn start(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let view = self.clone();
        tokio::spawn(async move {
            info!(
                view = view.name(),
                interval_ms = view.inner.interval.as_millis(),
                "starting refresh loop"
            );
            let mut ticker = tokio::time::interval(view.inner.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if view.safe_refresh().await.is_err() {
                            debug!(view = view.name(), "retrying on next tick");
                        }
                    }
                }
            }
            info!(view = view.name(), "refresh loop stopped");
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs synchronous store work on the blocking pool.
///
/// Panics inside `work` are resumed on the caller so view-level containment
/// observes them.
///
/// # Errors
///
/// Returns [`RefreshError::Store`] when `work` fails or the task is
/// cancelled.
pub async fn run_blocking<T, F>(work: F) -> Result<T, RefreshError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(|err| RefreshError::Store(err.to_string())),
        Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        Err(_) => Err(RefreshError::Cancelled),
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn run_blocking_maps_store_errors() {
        let err = run_blocking(|| Err::<(), _>(StoreError::Decode("bad row".to_string())))
            .await
            .unwrap_err();
        assert_eq!(err, RefreshError::Store("decode error: bad row".to_string()));
    }
}
