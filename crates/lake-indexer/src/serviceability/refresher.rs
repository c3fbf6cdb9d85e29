// crates/lake-indexer/src/serviceability/refresher.rs
// ============================================================================
// Module: Serviceability Refresher
// Description: Fetch, safety-check, convert, and store topology snapshots.
// Purpose: Drive the serviceability view.
// Dependencies: async-trait, time, tracing
// ============================================================================

//! ## Overview
//! One refresh fetches the program snapshot, refuses to write when a
//! required entity set came back empty, converts the records, and replaces
//! each dimension in order: contributors, devices, users, metros, links,
//! multicast groups. Every dimension in a refresh shares one snapshot time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;

use crate::serviceability::convert::convert_program_data;
use crate::serviceability::source::ServiceabilitySource;
use crate::serviceability::store::ServiceabilityStore;
use crate::serviceability::types::ProgramData;
use crate::view::RefreshError;
use crate::view::RefreshReport;
use crate::view::Refresher;
use crate::view::run_blocking;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// View name for the serviceability refresh.
pub const SERVICEABILITY_VIEW: &str = "serviceability";

// ============================================================================
// SECTION: Refresher
// ============================================================================

/// Refresher for the serviceability dimensions.
pub struct ServiceabilityRefresher {
    /// Snapshot source.
    source: Arc<dyn ServiceabilitySource>,
    /// Destination store.
    store: ServiceabilityStore,
}

impl ServiceabilityRefresher {
    /// Creates a refresher.
    #[must_use]
    pub fn new(source: Arc<dyn ServiceabilitySource>, store: ServiceabilityStore) -> Self {
        Self {
            source,
            store,
        }
    }

    /// Returns the destination store.
    #[must_use]
    pub const fn store(&self) -> &ServiceabilityStore {
        &self.store
    }
}

#[async_trait]
impl Refresher for ServiceabilityRefresher {
    fn name(&self) -> &str {
        SERVICEABILITY_VIEW
    }

    async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let data = self
            .source
            .program_data()
            .await
            .map_err(|err| RefreshError::Source(err.to_string()))?;
        debug!(
            view = SERVICEABILITY_VIEW,
            contributors = data.contributors.len(),
            devices = data.devices.len(),
            users = data.users.len(),
            links = data.links.len(),
            metros = data.exchanges.len(),
            multicast_groups = data.multicast_groups.len(),
            "fetched program data"
        );
        check_snapshot(&data)?;
        let snapshot = convert_program_data(&data);
        let store = self.store.clone();
        let snapshot_ts = Some(OffsetDateTime::now_utc());
        let rows_written = run_blocking(move || {
            let mut rows = 0;
            rows += store
                .replace_contributors(&snapshot.contributors, snapshot_ts)
                .map_err(|err| err.context("failed to replace contributors"))?
                .history_rows();
            rows += store
                .replace_devices(&snapshot.devices, snapshot_ts)
                .map_err(|err| err.context("failed to replace devices"))?
                .history_rows();
            rows += store
                .replace_users(&snapshot.users, snapshot_ts)
                .map_err(|err| err.context("failed to replace users"))?
                .history_rows();
            rows += store
                .replace_metros(&snapshot.metros, snapshot_ts)
                .map_err(|err| err.context("failed to replace metros"))?
                .history_rows();
            rows += store
                .replace_links(&snapshot.links, snapshot_ts)
                .map_err(|err| err.context("failed to replace links"))?
                .history_rows();
            rows += store
                .replace_multicast_groups(&snapshot.multicast_groups, snapshot_ts)
                .map_err(|err| err.context("failed to replace multicast groups"))?
                .history_rows();
            Ok(rows)
        })
        .await?;
        Ok(RefreshReport {
            rows_written,
        })
    }
}

// ============================================================================
// SECTION: Safety Check
// ============================================================================

/// Rejects snapshots missing a required entity set.
///
/// An empty contributor, device, or exchange set almost always means the
/// source misbehaved; writing it would tombstone the whole topology.
///
/// # Errors
///
/// Returns [`RefreshError::Unsafe`] naming the first empty set.
pub fn check_snapshot(data: &ProgramData) -> Result<(), RefreshError> {
    let required = [
        ("contributors", data.contributors.is_empty()),
        ("devices", data.devices.is_empty()),
        ("metros", data.exchanges.is_empty()),
    ];
    match required.iter().find(|(_, empty)| *empty) {
        Some((set, _)) => Err(RefreshError::Unsafe(format!(
            "refusing to write snapshot: source returned no {set} (possible source issue)"
        ))),
        None => Ok(()),
    }
}
