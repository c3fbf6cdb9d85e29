// crates/lake-indexer/src/validators/types.rs
// ============================================================================
// Module: Validator Types
// Description: Raw cluster snapshot records and converted validator records.
// Purpose: Model the validator set at the source and warehouse boundaries.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A [`ClusterSnapshot`] is one export of the cluster RPC surface: the
//! current epoch and slot, the leader schedule, vote accounts split into
//! current and delinquent, gossip-visible nodes, and cumulative block
//! production per leader identity. Domain records are what the warehouse
//! stores.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Raw Cluster Data
// ============================================================================

/// Full cluster snapshot returned by a cluster source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Current finalized epoch.
    pub epoch: u64,
    /// Current finalized slot.
    #[serde(default)]
    pub slot: u64,
    /// Leader slots keyed by node identity.
    #[serde(default)]
    pub leader_schedule: BTreeMap<String, Vec<u64>>,
    /// Vote accounts.
    #[serde(default)]
    pub vote_accounts: RawVoteAccounts,
    /// Gossip-visible cluster nodes.
    #[serde(default)]
    pub cluster_nodes: Vec<RawClusterNode>,
    /// `[leader_slots_assigned, blocks_produced]` keyed by leader identity.
    #[serde(default)]
    pub block_production: Option<BTreeMap<String, Vec<u64>>>,
}

/// Vote accounts split by delinquency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVoteAccounts {
    /// Accounts voting recently.
    #[serde(default)]
    pub current: Vec<RawVoteAccount>,
    /// Accounts behind the delinquency threshold.
    #[serde(default)]
    pub delinquent: Vec<RawVoteAccount>,
}

/// Vote account as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVoteAccount {
    /// Vote account public key.
    pub vote_pubkey: String,
    /// Validator identity public key.
    pub node_pubkey: String,
    /// Active stake in lamports.
    #[serde(default)]
    pub activated_stake: u64,
    /// Whether the account is staked for the current epoch.
    #[serde(default)]
    pub epoch_vote_account: bool,
    /// Commission percentage.
    #[serde(default)]
    pub commission: u8,
    /// Most recent voted slot.
    #[serde(default)]
    pub last_vote: u64,
    /// Current root slot.
    #[serde(default)]
    pub root_slot: u64,
    /// `[epoch, credits, previous_credits]` history, oldest first.
    #[serde(default)]
    pub epoch_credits: Vec<Vec<u64>>,
}

/// Cluster node as seen by gossip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawClusterNode {
    /// Node identity public key.
    pub pubkey: String,
    /// Gossip socket address (`ip:port`).
    #[serde(default)]
    pub gossip: Option<String>,
    /// TPU QUIC socket address (`ip:port`).
    #[serde(default)]
    pub tpu_quic: Option<String>,
    /// Software version.
    #[serde(default)]
    pub version: Option<String>,
}

// ============================================================================
// SECTION: Domain Records
// ============================================================================

/// Leader slots assigned to one node for an epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderScheduleEntry {
    /// Node identity public key.
    pub node_pubkey: String,
    /// Epoch the schedule belongs to.
    pub epoch: u64,
    /// Assigned slot indexes.
    pub slots: Vec<u64>,
}

/// Vote account dimension record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAccount {
    /// Vote account public key.
    pub vote_pubkey: String,
    /// Epoch of the snapshot.
    pub epoch: u64,
    /// Validator identity public key.
    pub node_pubkey: String,
    /// Active stake in lamports.
    pub activated_stake_lamports: u64,
    /// Whether the account is staked for the epoch.
    pub epoch_vote_account: bool,
    /// Commission percentage.
    pub commission_percentage: u8,
}

/// Gossip node dimension record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipNode {
    /// Node identity public key.
    pub pubkey: String,
    /// Epoch of the snapshot.
    pub epoch: u64,
    /// Gossip IP, empty when unknown.
    pub gossip_ip: String,
    /// Gossip port, zero when unknown.
    pub gossip_port: u16,
    /// TPU QUIC IP, empty when unknown.
    pub tpuquic_ip: String,
    /// TPU QUIC port, zero when unknown.
    pub tpuquic_port: u16,
    /// Software version, empty when unknown.
    pub version: String,
}

/// One vote account sample.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteAccountActivity {
    /// Collection time.
    pub event_ts: OffsetDateTime,
    /// Vote account public key.
    pub vote_account_pubkey: String,
    /// Validator identity public key.
    pub node_identity_pubkey: String,
    /// Root slot.
    pub root_slot: u64,
    /// Most recent voted slot.
    pub last_vote_slot: u64,
    /// Cluster slot at collection time.
    pub cluster_slot: u64,
    /// Whether the account was delinquent.
    pub is_delinquent: bool,
    /// Epoch credit history as JSON, empty when absent.
    pub epoch_credits_json: String,
    /// Epoch of the most recent credit entry.
    pub credits_epoch: u64,
    /// Credits of the most recent credit entry.
    pub credits_epoch_credits: u64,
    /// Active stake in lamports.
    pub activated_stake_lamports: u64,
    /// Active stake in SOL; `None` when unstaked.
    pub activated_stake_sol: Option<f64>,
    /// Commission percentage.
    pub commission: u8,
    /// Identifier shared by every sample of one collection.
    pub collector_run_id: String,
}

/// Cumulative block production of one leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockProduction {
    /// Epoch the counters belong to.
    pub epoch: u64,
    /// Collection time.
    pub event_ts: OffsetDateTime,
    /// Leader identity public key.
    pub leader_identity_pubkey: String,
    /// Leader slots assigned so far in the epoch.
    pub leader_slots_assigned_cum: u64,
    /// Blocks produced so far in the epoch.
    pub blocks_produced_cum: u64,
}

/// Converted dimension records of one cluster snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSnapshot {
    /// Leader schedule entries.
    pub leader_schedule: Vec<LeaderScheduleEntry>,
    /// Current vote accounts.
    pub vote_accounts: Vec<VoteAccount>,
    /// Gossip nodes.
    pub gossip_nodes: Vec<GossipNode>,
}
