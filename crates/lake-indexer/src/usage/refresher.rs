// crates/lake-indexer/src/usage/refresher.rs
// ============================================================================
// Module: Usage Refresher
// Description: Incremental interface counter refresh.
// Purpose: Drive the usage view once the topology is loaded.
// Dependencies: async-trait, time, tracing
// ============================================================================

//! ## Overview
//! A usage refresh waits for the serviceability view, picks its query
//! window, loads the state needed for deltas, fetches samples, converts
//! them, and appends the new rows.
//!
//! Window selection: with no stored data, or stored data older than the
//! query window, the window starts at `now - query_window`. Otherwise it
//! starts five minutes before the latest stored event to pick up late
//! arrivals; rows already stored are skipped during conversion.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::Duration;
use time::OffsetDateTime;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::readiness::ReadinessGate;
use crate::serviceability::ServiceabilityStore;
use crate::usage::convert::build_link_lookup;
use crate::usage::convert::convert_samples;
use crate::usage::source::CounterSource;
use crate::usage::store::UsageStore;
use crate::usage::types::MaxTimestampsByKey;
use crate::view::RefreshError;
use crate::view::RefreshReport;
use crate::view::Refresher;
use crate::view::run_blocking;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// View name for the usage refresh.
pub const USAGE_VIEW: &str = "usage";

/// Overlap re-queried before the latest stored event.
pub const LATE_ARRIVAL_OVERLAP: Duration = Duration::minutes(5);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Usage refresher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSettings {
    /// How far back an initial refresh reaches.
    pub query_window: Duration,
    /// How long to wait for the serviceability view.
    pub prerequisite_timeout: std::time::Duration,
}

// ============================================================================
// SECTION: Refresher
// ============================================================================

/// Refresher for interface usage facts.
pub struct UsageRefresher {
    /// Counter source.
    source: Arc<dyn CounterSource>,
    /// Destination store.
    store: UsageStore,
    /// Topology store used for link lookups.
    topology: ServiceabilityStore,
    /// Serviceability readiness.
    prerequisite: ReadinessGate,
    /// Settings.
    settings: UsageSettings,
}

impl UsageRefresher {
    /// Creates a refresher.
    #[must_use]
    pub fn new(
        source: Arc<dyn CounterSource>,
        store: UsageStore,
        topology: ServiceabilityStore,
        prerequisite: ReadinessGate,
        settings: UsageSettings,
    ) -> Self {
        Self {
            source,
            store,
            topology,
            prerequisite,
            settings,
        }
    }

    /// Returns the destination store.
    #[must_use]
    pub const fn store(&self) -> &UsageStore {
        &self.store
    }
}

#[async_trait]
impl Refresher for UsageRefresher {
    fn name(&self) -> &str {
        USAGE_VIEW
    }

    async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        self.prerequisite.wait_ready(self.settings.prerequisite_timeout).await?;

        let store = self.store.clone();
        let max_time = run_blocking(move || store.max_timestamp())
            .await
            .map_err(|err| RefreshError::Store(format!("failed to get max timestamp: {err}")))?;
        let now = OffsetDateTime::now_utc();
        let start = query_start(now, max_time, self.settings.query_window);
        debug!(
            view = USAGE_VIEW,
            has_data = max_time.is_some(),
            %start,
            %now,
            "selected query window"
        );

        let store = self.store.clone();
        let already_written = match run_blocking(move || store.max_timestamps_by_key(start)).await {
            Ok(written) => written,
            Err(err) => {
                warn!(
                    view = USAGE_VIEW,
                    error = %err,
                    "failed to load already-written timestamps; proceeding without dedup"
                );
                MaxTimestampsByKey::new()
            }
        };

        let store = self.store.clone();
        let baselines = run_blocking(move || store.baselines_before(start))
            .await
            .map_err(|err| RefreshError::Store(format!("failed to load baselines: {err}")))?;

        let topology = self.topology.clone();
        let links = match run_blocking(move || topology.current_links()).await {
            Ok(links) => build_link_lookup(&links),
            Err(err) => {
                warn!(
                    view = USAGE_VIEW,
                    error = %err,
                    "failed to build link lookup; proceeding without link information"
                );
                BTreeMap::new()
            }
        };

        let samples = self
            .source
            .samples(start, now)
            .await
            .map_err(|err| RefreshError::Source(err.to_string()))?;
        let usage = convert_samples(&samples, &baselines, &links, &already_written);
        info!(
            view = USAGE_VIEW,
            samples = samples.len(),
            rows = usage.len(),
            baselines = baselines.len(),
            links = links.len(),
            "converted counter samples"
        );
        if usage.is_empty() {
            warn!(view = USAGE_VIEW, %start, %now, "no new usage rows in window");
            return Ok(RefreshReport::default());
        }

        let store = self.store.clone();
        let rows_written = run_blocking(move || store.insert_interface_usage(&usage))
            .await
            .map_err(|err| {
                RefreshError::Store(format!("failed to insert interface usage: {err}"))
            })?;
        Ok(RefreshReport {
            rows_written,
        })
    }
}

// ============================================================================
// SECTION: Window
// ============================================================================

/// Returns the start of the next query window.
#[must_use]
pub fn query_start(
    now: OffsetDateTime,
    max_stored: Option<OffsetDateTime>,
    query_window: Duration,
) -> OffsetDateTime {
    let window_start = now - query_window;
    match max_stored {
        Some(max) if max > window_start => max - LATE_ARRIVAL_OVERLAP,
        _ => window_start,
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

    use time::macros::datetime;

    use super::*;

    #[test]
    fn initial_window_reaches_back_full_window() {
        let now = datetime!(2024-05-01 12:00:00 UTC);
        assert_eq!(query_start(now, None, Duration::hours(1)), datetime!(2024-05-01 11:00:00 UTC));
    }

    #[test]
    fn incremental_window_overlaps_latest_event() {
        let now = datetime!(2024-05-01 12:00:00 UTC);
        let max = datetime!(2024-05-01 11:50:00 UTC);
        assert_eq!(
            query_start(now, Some(max), Duration::hours(1)),
            datetime!(2024-05-01 11:45:00 UTC)
        );
    }

    #[test]
    fn stale_data_falls_back_to_window() {
        let now = datetime!(2024-05-01 12:00:00 UTC);
        let max = datetime!(2024-04-30 12:00:00 UTC);
        assert_eq!(
            query_start(now, Some(max), Duration::hours(1)),
            datetime!(2024-05-01 11:00:00 UTC)
        );
    }
}
