// crates/lake-indexer/src/validators/schema.rs
// ============================================================================
// Module: Validator Schemas
// Description: Dimension and fact schemas with row codecs for validator data.
// Purpose: Describe the validator set to the dimension engine and fact writer.
// Dependencies: lake-core, lake-store-sqlite, time
// ============================================================================

//! ## Overview
//! Three dimensions track the validator set, each keyed by its own public
//! key column: `solana_leader_schedule` (node identity),
//! `solana_vote_accounts` (vote account), and `solana_gossip_nodes` (node
//! identity). Two append-only facts record per-collection samples:
//! `solana_vote_account_activity` and `solana_block_production`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lake_core::DimensionSchema;
use lake_core::FactSchema;
use lake_core::RowResult;
use lake_core::Value;
use lake_core::to_unix_millis;
use lake_store_sqlite::DimensionRow;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::serviceability::schema::DimensionRecord;
use crate::serviceability::schema::from_json;
use crate::serviceability::schema::read_int;
use crate::serviceability::schema::read_text;
use crate::serviceability::schema::text;
use crate::serviceability::schema::to_json;
use crate::serviceability::schema::unsigned;
use crate::validators::types::BlockProduction;
use crate::validators::types::GossipNode;
use crate::validators::types::LeaderScheduleEntry;
use crate::validators::types::VoteAccount;
use crate::validators::types::VoteAccountActivity;

// ============================================================================
// SECTION: Dimension Schemas
// ============================================================================

/// Declares a unit schema type for a validator dimension.
macro_rules! validator_schema {
    (
        $(#[$meta:meta])* $schema:ident,
        $name:literal,
        $pk:literal,
        [$($column:literal),+ $(,)?]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $schema;

        impl DimensionSchema for $schema {
            fn name(&self) -> &str {
                $name
            }

            fn primary_key_columns(&self) -> &[&str] {
                &[$pk]
            }

            fn payload_columns(&self) -> &[&str] {
                &[$($column),+]
            }
        }
    };
}

validator_schema!(
    /// `solana_leader_schedule` dimension.
    LeaderScheduleSchema,
    "solana_leader_schedule",
    "node_pubkey:VARCHAR",
    ["epoch:BIGINT", "slots:VARCHAR", "slot_count:BIGINT"]
);

validator_schema!(
    /// `solana_vote_accounts` dimension.
    VoteAccountSchema,
    "solana_vote_accounts",
    "vote_pubkey:VARCHAR",
    [
        "epoch:BIGINT",
        "node_pubkey:VARCHAR",
        "activated_stake_lamports:BIGINT",
        "epoch_vote_account:VARCHAR",
        "commission_percentage:INTEGER",
    ]
);

validator_schema!(
    /// `solana_gossip_nodes` dimension.
    GossipNodeSchema,
    "solana_gossip_nodes",
    "pubkey:VARCHAR",
    [
        "epoch:BIGINT",
        "gossip_ip:VARCHAR",
        "gossip_port:INTEGER",
        "tpuquic_ip:VARCHAR",
        "tpuquic_port:INTEGER",
        "version:VARCHAR",
    ]
);

/// Every validator dimension, in refresh order.
pub const VALIDATOR_SCHEMAS: [&dyn DimensionSchema; 3] =
    [&LeaderScheduleSchema, &VoteAccountSchema, &GossipNodeSchema];

/// Looks up a validator dimension schema by dataset name.
#[must_use]
pub fn schema_by_name(name: &str) -> Option<&'static dyn DimensionSchema> {
    VALIDATOR_SCHEMAS.into_iter().find(|schema| schema.name() == name)
}

// ============================================================================
// SECTION: Dimension Records
// ============================================================================

impl DimensionRecord for LeaderScheduleEntry {
    type Schema = LeaderScheduleSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![
            text(&self.node_pubkey),
            unsigned("epoch", self.epoch)?,
            Value::Text(to_json(&self.slots)?),
            unsigned("slot_count", u64::try_from(self.slots.len()).unwrap_or(u64::MAX))?,
        ])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            node_pubkey: read_text(row, "node_pubkey")?,
            epoch: read_int(row, "epoch")?,
            slots: from_json(row, "slots")?,
        })
    }
}

impl DimensionRecord for VoteAccount {
    type Schema = VoteAccountSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![
            text(&self.vote_pubkey),
            unsigned("epoch", self.epoch)?,
            text(&self.node_pubkey),
            unsigned("activated_stake_lamports", self.activated_stake_lamports)?,
            text(if self.epoch_vote_account { "true" } else { "false" }),
            Value::from(u32::from(self.commission_percentage)),
        ])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            vote_pubkey: read_text(row, "vote_pubkey")?,
            epoch: read_int(row, "epoch")?,
            node_pubkey: read_text(row, "node_pubkey")?,
            activated_stake_lamports: read_int(row, "activated_stake_lamports")?,
            epoch_vote_account: read_text(row, "epoch_vote_account")? == "true",
            commission_percentage: read_int(row, "commission_percentage")?,
        })
    }
}

impl DimensionRecord for GossipNode {
    type Schema = GossipNodeSchema;

    fn to_row(&self) -> RowResult {
        Ok(vec![
            text(&self.pubkey),
            unsigned("epoch", self.epoch)?,
            text(&self.gossip_ip),
            Value::from(self.gossip_port),
            text(&self.tpuquic_ip),
            Value::from(self.tpuquic_port),
            text(&self.version),
        ])
    }

    fn from_row(row: &DimensionRow) -> Result<Self, StoreError> {
        Ok(Self {
            pubkey: read_text(row, "pubkey")?,
            epoch: read_int(row, "epoch")?,
            gossip_ip: read_text(row, "gossip_ip")?,
            gossip_port: read_int(row, "gossip_port")?,
            tpuquic_ip: read_text(row, "tpuquic_ip")?,
            tpuquic_port: read_int(row, "tpuquic_port")?,
            version: read_text(row, "version")?,
        })
    }
}

// ============================================================================
// SECTION: Fact Schemas
// ============================================================================

/// Fact name of the vote account activity relation.
pub const VOTE_ACCOUNT_ACTIVITY_FACT: &str = "solana_vote_account_activity";

/// Fact name of the block production relation.
pub const BLOCK_PRODUCTION_FACT: &str = "solana_block_production";

/// Declared columns of the vote account activity relation.
const ACTIVITY_COLUMNS: &[&str] = &[
    "event_ts:TIMESTAMP",
    "ingested_at:TIMESTAMP",
    "vote_account_pubkey:VARCHAR",
    "node_identity_pubkey:VARCHAR",
    "root_slot:BIGINT",
    "last_vote_slot:BIGINT",
    "cluster_slot:BIGINT",
    "is_delinquent:BOOLEAN",
    "epoch_credits_json:VARCHAR",
    "credits_epoch:BIGINT",
    "credits_epoch_credits:BIGINT",
    "activated_stake_lamports:BIGINT",
    "activated_stake_sol:DOUBLE",
    "commission:INTEGER",
    "collector_run_id:VARCHAR",
];

/// Declared columns of the block production relation.
const BLOCK_PRODUCTION_COLUMNS: &[&str] = &[
    "epoch:BIGINT",
    "event_ts:TIMESTAMP",
    "ingested_at:TIMESTAMP",
    "leader_identity_pubkey:VARCHAR",
    "leader_slots_assigned_cum:BIGINT",
    "blocks_produced_cum:BIGINT",
];

/// `solana_vote_account_activity` fact schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoteAccountActivitySchema;

impl FactSchema for VoteAccountActivitySchema {
    fn name(&self) -> &str {
        VOTE_ACCOUNT_ACTIVITY_FACT
    }

    fn columns(&self) -> &[&str] {
        ACTIVITY_COLUMNS
    }

    fn time_column(&self) -> Option<&str> {
        Some("event_ts")
    }

    fn partition_by_time(&self) -> bool {
        true
    }
}

/// `solana_block_production` fact schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockProductionSchema;

impl FactSchema for BlockProductionSchema {
    fn name(&self) -> &str {
        BLOCK_PRODUCTION_FACT
    }

    fn columns(&self) -> &[&str] {
        BLOCK_PRODUCTION_COLUMNS
    }

    fn time_column(&self) -> Option<&str> {
        Some("event_ts")
    }

    fn partition_by_time(&self) -> bool {
        true
    }
}

// ============================================================================
// SECTION: Fact Rows
// ============================================================================

/// Encodes a vote account sample in column order.
///
/// # Errors
///
/// Returns [`lake_core::RowSourceError`] when a counter exceeds the BIGINT
/// range.
pub fn activity_row(activity: &VoteAccountActivity, ingested_at: OffsetDateTime) -> RowResult {
    Ok(vec![
        Value::Int(to_unix_millis(activity.event_ts)),
        Value::Int(to_unix_millis(ingested_at)),
        text(&activity.vote_account_pubkey),
        text(&activity.node_identity_pubkey),
        unsigned("root_slot", activity.root_slot)?,
        unsigned("last_vote_slot", activity.last_vote_slot)?,
        unsigned("cluster_slot", activity.cluster_slot)?,
        Value::Bool(activity.is_delinquent),
        text(&activity.epoch_credits_json),
        unsigned("credits_epoch", activity.credits_epoch)?,
        unsigned("credits_epoch_credits", activity.credits_epoch_credits)?,
        unsigned("activated_stake_lamports", activity.activated_stake_lamports)?,
        activity.activated_stake_sol.map_or(Value::Null, Value::Float),
        Value::from(u32::from(activity.commission)),
        text(&activity.collector_run_id),
    ])
}

/// Encodes a block production row in column order.
///
/// # Errors
///
/// Returns [`lake_core::RowSourceError`] when a counter exceeds the BIGINT
/// range.
pub fn block_production_row(
    production: &BlockProduction,
    ingested_at: OffsetDateTime,
) -> RowResult {
    Ok(vec![
        unsigned("epoch", production.epoch)?,
        Value::Int(to_unix_millis(production.event_ts)),
        Value::Int(to_unix_millis(ingested_at)),
        text(&production.leader_identity_pubkey),
        unsigned("leader_slots_assigned_cum", production.leader_slots_assigned_cum)?,
        unsigned("blocks_produced_cum", production.blocks_produced_cum)?,
    ])
}

// ============================================================================
// SECTION: Tests
// ============================================================================
