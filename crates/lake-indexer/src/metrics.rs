// crates/lake-indexer/src/metrics.rs
// ============================================================================
// Module: View Metrics
// Description: Observability hooks for view refresh loops.
// Purpose: Provide refresh counters and duration buckets without hard deps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Views report one outcome and one duration per refresh. The sink is a
//! trait so deployments can plug in Prometheus or OpenTelemetry; the default
//! discards everything.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default refresh duration buckets in seconds.
pub const REFRESH_DURATION_BUCKETS_SECS: &[f64] =
    &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Refresh outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
    /// Refresh completed and wrote its snapshot.
    Success,
    /// Refresh returned an error.
    Error,
    /// Refresh panicked and was contained.
    Panic,
}

impl RefreshOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Panic => "panic",
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for view refreshes.
pub trait ViewMetrics: Send + Sync {
    /// Records one refresh outcome.
    fn record_refresh(&self, view: &str, outcome: RefreshOutcome);
    /// Records the wall-clock duration of one refresh.
    fn record_duration(&self, view: &str, duration: Duration);
}

/// No-op metrics sink.
pub struct NoopViewMetrics;

impl ViewMetrics for NoopViewMetrics {
    fn record_refresh(&self, _view: &str, _outcome: RefreshOutcome) {}

    fn record_duration(&self, _view: &str, _duration: Duration) {}
}
