// crates/lake-indexer/src/validators/store.rs
// ============================================================================
// Module: Validator Store
// Description: Typed facade over the validator dimensions and facts.
// Purpose: Replace validator snapshots and append per-collection samples.
// Dependencies: lake-core, lake-store-sqlite, time
// ============================================================================

//! ## Overview
//! `replace_*` calls write complete snapshots with
//! `missing_means_deleted = true`; `current_*` calls decode live entities.
//! `insert_*` calls append fact rows. All calls are synchronous.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lake_core::CancelToken;
use lake_store_sqlite::FactDataset;
use lake_store_sqlite::Warehouse;
use lake_store_sqlite::WriteSummary;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::serviceability::store::current_records;
use crate::serviceability::store::replace_records;
use crate::validators::schema::BlockProductionSchema;
use crate::validators::schema::VoteAccountActivitySchema;
use crate::validators::schema::activity_row;
use crate::validators::schema::block_production_row;
use crate::validators::types::BlockProduction;
use crate::validators::types::GossipNode;
use crate::validators::types::LeaderScheduleEntry;
use crate::validators::types::VoteAccount;
use crate::validators::types::VoteAccountActivity;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store for validator dimensions and facts.
#[derive(Clone)]
pub struct ValidatorStore {
    /// Warehouse handle.
    warehouse: Warehouse,
    /// Vote account activity relation.
    activity: FactDataset,
    /// Block production relation.
    block_production: FactDataset,
}

impl ValidatorStore {
    /// Creates a store over an open warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a fact layout is rejected.
    pub fn new(warehouse: Warehouse) -> Result<Self, StoreError> {
        Ok(Self {
            warehouse,
            activity: FactDataset::new(&VoteAccountActivitySchema)?,
            block_production: FactDataset::new(&BlockProductionSchema)?,
        })
    }

    /// Returns the warehouse handle.
    #[must_use]
    pub const fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Replaces the leader schedule snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_leader_schedule(
        &self,
        records: &[LeaderScheduleEntry],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        replace_records(&self.warehouse, records, snapshot_ts)
    }

    /// Replaces the vote account snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_vote_accounts(
        &self,
        records: &[VoteAccount],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        replace_records(&self.warehouse, records, snapshot_ts)
    }

    /// Replaces the gossip node snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn replace_gossip_nodes(
        &self,
        records: &[GossipNode],
        snapshot_ts: Option<OffsetDateTime>,
    ) -> Result<WriteSummary, StoreError> {
        replace_records(&self.warehouse, records, snapshot_ts)
    }

    /// Returns the live leader schedule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_leader_schedule(&self) -> Result<Vec<LeaderScheduleEntry>, StoreError> {
        current_records(&self.warehouse)
    }

    /// Returns live vote accounts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_vote_accounts(&self) -> Result<Vec<VoteAccount>, StoreError> {
        current_records(&self.warehouse)
    }

    /// Returns live gossip nodes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read or decode fails.
    pub fn current_gossip_nodes(&self) -> Result<Vec<GossipNode>, StoreError> {
        current_records(&self.warehouse)
    }

    /// Appends vote account samples. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn insert_vote_account_activity(
        &self,
        entries: &[VoteAccountActivity],
    ) -> Result<usize, StoreError> {
        let ingested_at = OffsetDateTime::now_utc();
        let written = self.activity.write_batch(
            &self.warehouse,
            entries.len(),
            |index| activity_row(&entries[index], ingested_at),
            &CancelToken::new(),
        )?;
        Ok(written)
    }

    /// Appends block production rows. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn insert_block_production(
        &self,
        entries: &[BlockProduction],
    ) -> Result<usize, StoreError> {
        let ingested_at = OffsetDateTime::now_utc();
        let written = self.block_production.write_batch(
            &self.warehouse,
            entries.len(),
            |index| block_production_row(&entries[index], ingested_at),
            &CancelToken::new(),
        )?;
        Ok(written)
    }
}
