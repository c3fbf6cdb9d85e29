// crates/lake-indexer/src/validators/convert.rs
// ============================================================================
// Module: Validator Conversion
// Description: Raw cluster snapshot to validator records.
// Purpose: Derive dimension and fact records from one cluster snapshot.
// Dependencies: serde_json, time, tracing
// ============================================================================

//! ## Overview
//! Conversion is pure. Dimension records carry the snapshot epoch so each
//! epoch produces a new version. Socket addresses split into IP and port,
//! and an unparseable address yields an empty IP with port zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;

use time::OffsetDateTime;
use tracing::warn;

use crate::validators::types::BlockProduction;
use crate::validators::types::ClusterSnapshot;
use crate::validators::types::GossipNode;
use crate::validators::types::LeaderScheduleEntry;
use crate::validators::types::RawVoteAccount;
use crate::validators::types::ValidatorSnapshot;
use crate::validators::types::VoteAccount;
use crate::validators::types::VoteAccountActivity;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lamports per SOL.
const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

// ============================================================================
// SECTION: Dimensions
// ============================================================================

/// Converts the dimension parts of a cluster snapshot.
#[must_use]
pub fn convert_cluster_snapshot(snapshot: &ClusterSnapshot) -> ValidatorSnapshot {
    let epoch = snapshot.epoch;
    let leader_schedule = snapshot
        .leader_schedule
        .iter()
        .map(|(node_pubkey, slots)| LeaderScheduleEntry {
            node_pubkey: node_pubkey.clone(),
            epoch,
            slots: slots.clone(),
        })
        .collect();
    let vote_accounts = snapshot
        .vote_accounts
        .current
        .iter()
        .map(|account| VoteAccount {
            vote_pubkey: account.vote_pubkey.clone(),
            epoch,
            node_pubkey: account.node_pubkey.clone(),
            activated_stake_lamports: account.activated_stake,
            epoch_vote_account: account.epoch_vote_account,
            commission_percentage: account.commission,
        })
        .collect();
    let gossip_nodes = snapshot
        .cluster_nodes
        .iter()
        .map(|node| {
            let (gossip_ip, gossip_port) = split_socket(node.gossip.as_deref());
            let (tpuquic_ip, tpuquic_port) = split_socket(node.tpu_quic.as_deref());
            GossipNode {
                pubkey: node.pubkey.clone(),
                epoch,
                gossip_ip,
                gossip_port,
                tpuquic_ip,
                tpuquic_port,
                version: node.version.clone().unwrap_or_default(),
            }
        })
        .collect();
    ValidatorSnapshot {
        leader_schedule,
        vote_accounts,
        gossip_nodes,
    }
}

/// Splits `ip:port` into its parts.
#[must_use]
pub fn split_socket(address: Option<&str>) -> (String, u16) {
    match address.and_then(|value| value.parse::<SocketAddr>().ok()) {
        Some(socket) => (socket.ip().to_string(), socket.port()),
        None => (String::new(), 0),
    }
}

// ============================================================================
// SECTION: Facts
// ============================================================================

/// Samples every current and delinquent vote account.
#[must_use]
pub fn vote_account_activity(
    snapshot: &ClusterSnapshot,
    collected_at: OffsetDateTime,
) -> Vec<VoteAccountActivity> {
    let run_id = format!("vote_account_activity_{}", collected_at.unix_timestamp());
    let current = snapshot.vote_accounts.current.iter().map(|account| (account, false));
    let delinquent = snapshot.vote_accounts.delinquent.iter().map(|account| (account, true));
    current
        .chain(delinquent)
        .map(|(account, is_delinquent)| {
            activity_entry(account, is_delinquent, snapshot.slot, collected_at, &run_id)
        })
        .collect()
}

/// Builds one vote account sample.
fn activity_entry(
    account: &RawVoteAccount,
    is_delinquent: bool,
    cluster_slot: u64,
    collected_at: OffsetDateTime,
    run_id: &str,
) -> VoteAccountActivity {
    let (epoch_credits_json, credits_epoch, credits_epoch_credits) =
        match account.epoch_credits.last() {
            Some(last) => (
                serde_json::to_string(&account.epoch_credits).unwrap_or_default(),
                last.first().copied().unwrap_or_default(),
                last.get(1).copied().unwrap_or_default(),
            ),
            None => (String::new(), 0, 0),
        };
    VoteAccountActivity {
        event_ts: collected_at,
        vote_account_pubkey: account.vote_pubkey.clone(),
        node_identity_pubkey: account.node_pubkey.clone(),
        root_slot: account.root_slot,
        last_vote_slot: account.last_vote,
        cluster_slot,
        is_delinquent,
        epoch_credits_json,
        credits_epoch,
        credits_epoch_credits,
        activated_stake_lamports: account.activated_stake,
        activated_stake_sol: lamports_to_sol(account.activated_stake),
        commission: account.commission,
        collector_run_id: run_id.to_string(),
    }
}

/// Converts a positive stake to SOL.
#[allow(clippy::cast_precision_loss, reason = "Stake in SOL is a lossy display value.")]
fn lamports_to_sol(lamports: u64) -> Option<f64> {
    (lamports > 0).then(|| lamports as f64 / LAMPORTS_PER_SOL)
}

/// Extracts cumulative block production per leader.
///
/// Entries with fewer than two counters are skipped.
#[must_use]
pub fn block_production(
    snapshot: &ClusterSnapshot,
    collected_at: OffsetDateTime,
) -> Vec<BlockProduction> {
    let Some(by_identity) = &snapshot.block_production else {
        return Vec::new();
    };
    by_identity
        .iter()
        .filter_map(|(identity, production)| match production.as_slice() {
            [assigned, produced, ..] => Some(BlockProduction {
                epoch: snapshot.epoch,
                event_ts: collected_at,
                leader_identity_pubkey: identity.clone(),
                leader_slots_assigned_cum: *assigned,
                blocks_produced_cum: *produced,
            }),
            _ => {
                warn!(
                    identity = %identity,
                    values = production.len(),
                    "invalid block production data"
                );
                None
            }
        })
        .collect()
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

    use std::collections::BTreeMap;

    use time::macros::datetime;

    use super::*;
    use crate::validators::types::RawClusterNode;
    use crate::validators::types::RawVoteAccounts;

    fn account(vote: &str, stake: u64, credits: Vec<Vec<u64>>) -> RawVoteAccount {
        RawVoteAccount {
            vote_pubkey: vote.to_string(),
            node_pubkey: format!("{vote}-node"),
            activated_stake: stake,
            epoch_vote_account: true,
            commission: 7,
            last_vote: 1_050,
            root_slot: 1_010,
            epoch_credits: credits,
        }
    }

    fn snapshot() -> ClusterSnapshot {
        ClusterSnapshot {
            epoch: 600,
            slot: 1_060,
            leader_schedule: BTreeMap::from([("node-b".to_string(), vec![4, 5])]),
            vote_accounts: RawVoteAccounts {
                current: vec![account(
                    "vote-a",
                    2_500_000_000,
                    vec![vec![599, 10, 0], vec![600, 42, 10]],
                )],
                delinquent: vec![account("vote-d", 0, Vec::new())],
            },
            cluster_nodes: vec![RawClusterNode {
                pubkey: "node-b".to_string(),
                gossip: Some("10.1.2.3:8001".to_string()),
                tpu_quic: Some("not-an-address".to_string()),
                version: Some("2.1.0".to_string()),
            }],
            block_production: Some(BTreeMap::from([
                ("node-b".to_string(), vec![8, 7]),
                ("node-x".to_string(), vec![3]),
            ])),
        }
    }

    #[test]
    fn dimensions_carry_epoch_and_split_sockets() {
        let converted = convert_cluster_snapshot(&snapshot());
        assert_eq!(converted.leader_schedule[0].slots, vec![4, 5]);
        assert_eq!(converted.vote_accounts.len(), 1);
        assert_eq!(converted.vote_accounts[0].epoch, 600);
        let node = &converted.gossip_nodes[0];
        assert_eq!((node.gossip_ip.as_str(), node.gossip_port), ("10.1.2.3", 8001));
        assert_eq!((node.tpuquic_ip.as_str(), node.tpuquic_port), ("", 0));
        assert_eq!(node.version, "2.1.0");
    }

    #[test]
    fn activity_covers_delinquent_accounts_and_latest_credits() {
        let collected = datetime!(2024-05-01 12:00:00 UTC);
        let activity = vote_account_activity(&snapshot(), collected);
        assert_eq!(activity.len(), 2);

        let current = &activity[0];
        assert!(!current.is_delinquent);
        assert_eq!(current.cluster_slot, 1_060);
        assert_eq!((current.credits_epoch, current.credits_epoch_credits), (600, 42));
        assert_eq!(current.epoch_credits_json, "[[599,10,0],[600,42,10]]");
        assert_eq!(current.activated_stake_sol, Some(2.5));
        let run_id = format!("vote_account_activity_{}", collected.unix_timestamp());
        assert_eq!(current.collector_run_id, run_id);

        let delinquent = &activity[1];
        assert!(delinquent.is_delinquent);
        assert_eq!(delinquent.epoch_credits_json, "");
        assert_eq!(delinquent.activated_stake_sol, None);
    }

    #[test]
    fn malformed_block_production_entries_are_skipped() {
        let entries = block_production(&snapshot(), datetime!(2024-05-01 12:00:00 UTC));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].leader_identity_pubkey, "node-b");
        assert_eq!((entries[0].leader_slots_assigned_cum, entries[0].blocks_produced_cum), (8, 7));

        let none = ClusterSnapshot {
            block_production: None,
            ..snapshot()
        };
        assert!(block_production(&none, datetime!(2024-05-01 12:00:00 UTC)).is_empty());
    }
}
