// crates/lake-indexer/src/validators/refresher.rs
// ============================================================================
// Module: Validator Refreshers
// Description: Fetch, safety-check, convert, and store validator snapshots.
// Purpose: Drive the validator and block production views.
// Dependencies: async-trait, time, tracing
// ============================================================================

//! ## Overview
//! [`ValidatorsRefresher`] fetches a cluster snapshot, refuses to write
//! when a required set came back empty, and replaces the leader schedule,
//! vote accounts, and gossip nodes in that order under one snapshot time.
//! It then samples vote account activity; a failed sample is logged and
//! does not fail the refresh.
//!
//! [`BlockProductionRefresher`] runs on its own, slower interval and
//! appends cumulative block production per leader.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;
use tracing::warn;

use crate::validators::convert::block_production;
use crate::validators::convert::convert_cluster_snapshot;
use crate::validators::convert::vote_account_activity;
use crate::validators::source::ClusterSource;
use crate::validators::store::ValidatorStore;
use crate::validators::types::ClusterSnapshot;
use crate::view::RefreshError;
use crate::view::RefreshReport;
use crate::view::Refresher;
use crate::view::run_blocking;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// View name for the validator refresh.
pub const VALIDATORS_VIEW: &str = "validators";

/// View name for the block production refresh.
pub const BLOCK_PRODUCTION_VIEW: &str = "block_production";

// ============================================================================
// SECTION: Validators Refresher
// ============================================================================

/// Refresher for the validator dimensions.
pub struct ValidatorsRefresher {
    /// Cluster source.
    source: Arc<dyn ClusterSource>,
    /// Destination store.
    store: ValidatorStore,
}

impl ValidatorsRefresher {
    /// Creates a refresher.
    #[must_use]
    pub fn new(source: Arc<dyn ClusterSource>, store: ValidatorStore) -> Self {
        Self {
            source,
            store,
        }
    }

    /// Returns the destination store.
    #[must_use]
    pub const fn store(&self) -> &ValidatorStore {
        &self.store
    }
}

#[async_trait]
impl Refresher for ValidatorsRefresher {
    fn name(&self) -> &str {
        VALIDATORS_VIEW
    }

    async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let snapshot = self
            .source
            .cluster_snapshot()
            .await
            .map_err(|err| RefreshError::Source(err.to_string()))?;
        debug!(
            view = VALIDATORS_VIEW,
            epoch = snapshot.epoch,
            leaders = snapshot.leader_schedule.len(),
            vote_accounts = snapshot.vote_accounts.current.len(),
            delinquent = snapshot.vote_accounts.delinquent.len(),
            gossip_nodes = snapshot.cluster_nodes.len(),
            "fetched cluster snapshot"
        );
        check_cluster_snapshot(&snapshot)?;
        let validators = convert_cluster_snapshot(&snapshot);
        let store = self.store.clone();
        let snapshot_ts = Some(OffsetDateTime::now_utc());
        let mut rows_written = run_blocking(move || {
            let mut rows = 0;
            rows += store
                .replace_leader_schedule(&validators.leader_schedule, snapshot_ts)
                .map_err(|err| err.context("failed to replace leader schedule"))?
                .history_rows();
            rows += store
                .replace_vote_accounts(&validators.vote_accounts, snapshot_ts)
                .map_err(|err| err.context("failed to replace vote accounts"))?
                .history_rows();
            rows += store
                .replace_gossip_nodes(&validators.gossip_nodes, snapshot_ts)
                .map_err(|err| err.context("failed to replace gossip nodes"))?
                .history_rows();
            Ok(rows)
        })
        .await?;

        let activity = vote_account_activity(&snapshot, OffsetDateTime::now_utc());
        if !activity.is_empty() {
            let store = self.store.clone();
            match run_blocking(move || store.insert_vote_account_activity(&activity)).await {
                Ok(written) => rows_written += written,
                Err(err) => warn!(
                    view = VALIDATORS_VIEW,
                    error = %err,
                    "failed to refresh vote account activity"
                ),
            }
        }
        Ok(RefreshReport {
            rows_written,
        })
    }
}

// ============================================================================
// SECTION: Block Production Refresher
// ============================================================================

/// Refresher for cumulative block production.
pub struct BlockProductionRefresher {
    /// Cluster source.
    source: Arc<dyn ClusterSource>,
    /// Destination store.
    store: ValidatorStore,
}

impl BlockProductionRefresher {
    /// Creates a refresher.
    #[must_use]
    pub fn new(source: Arc<dyn ClusterSource>, store: ValidatorStore) -> Self {
        Self {
            source,
            store,
        }
    }
}

#[async_trait]
impl Refresher for BlockProductionRefresher {
    fn name(&self) -> &str {
        BLOCK_PRODUCTION_VIEW
    }

    async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let snapshot = self
            .source
            .cluster_snapshot()
            .await
            .map_err(|err| RefreshError::Source(err.to_string()))?;
        let entries = block_production(&snapshot, OffsetDateTime::now_utc());
        if entries.is_empty() {
            debug!(view = BLOCK_PRODUCTION_VIEW, "block production has no identity data");
            return Ok(RefreshReport::default());
        }
        let epoch = snapshot.epoch;
        let store = self.store.clone();
        let rows_written = run_blocking(move || store.insert_block_production(&entries))
            .await
            .map_err(|err| {
                RefreshError::Store(format!("failed to insert block production: {err}"))
            })?;
        debug!(
            view = BLOCK_PRODUCTION_VIEW,
            rows = rows_written,
            epoch,
            "inserted block production"
        );
        Ok(RefreshReport {
            rows_written,
        })
    }
}

// ============================================================================
// SECTION: Safety Check
// ============================================================================

/// Rejects cluster snapshots missing a required set.
///
/// # Errors
///
/// Returns [`RefreshError::Unsafe`] naming the first empty set.
pub fn check_cluster_snapshot(snapshot: &ClusterSnapshot) -> Result<(), RefreshError> {
    let required = [
        ("leader schedule", snapshot.leader_schedule.is_empty()),
        ("vote accounts", snapshot.vote_accounts.current.is_empty()),
        ("gossip nodes", snapshot.cluster_nodes.is_empty()),
    ];
    match required.iter().find(|(_, empty)| *empty) {
        Some((set, _)) => Err(RefreshError::Unsafe(format!(
            "refusing to write snapshot: source returned no {set} (possible source issue)"
        ))),
        None => Ok(()),
    }
}
