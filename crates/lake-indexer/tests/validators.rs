// crates/lake-indexer/tests/validators.rs
// ============================================================================
// Module: Validators Tests
// Description: Store round trips, refresh safety checks, and fact samples.
// Purpose: Validate the validator domain end to end.
// ============================================================================

//! ## Overview
//! Integration tests for the validators domain:
//! - Store replace/current round trips and tombstoning of missing entities
//! - Refreshes that write dimensions plus vote account activity
//! - Refreshes that refuse empty sets without writing anything
//! - Block production samples and the JSON file source

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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lake_indexer::Indexer;
use lake_indexer::IndexerConfig;
use lake_indexer::IndexerSources;
use lake_indexer::NoopViewMetrics;
use lake_indexer::RefreshError;
use lake_indexer::Refresher;
use lake_indexer::SourceError;
use lake_indexer::ValidatorsViewConfig;
use lake_indexer::serviceability::JsonFileServiceabilitySource;
use lake_indexer::validators::BlockProductionRefresher;
use lake_indexer::validators::ClusterSnapshot;
use lake_indexer::validators::ClusterSource;
use lake_indexer::validators::JsonFileClusterSource;
use lake_indexer::validators::RawClusterNode;
use lake_indexer::validators::RawVoteAccount;
use lake_indexer::validators::RawVoteAccounts;
use lake_indexer::validators::ValidatorStore;
use lake_indexer::validators::ValidatorsRefresher;
use lake_indexer::validators::convert::convert_cluster_snapshot;
use lake_indexer::validators::schema::BlockProductionSchema;
use lake_indexer::validators::schema::VoteAccountActivitySchema;
use lake_store_sqlite::FactDataset;
use lake_store_sqlite::Warehouse;
use lake_store_sqlite::WarehouseConfig;
use lake_store_sqlite::WarehouseError;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(dir: &TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig::new(dir.path().join("lake.db"))).unwrap()
}

fn vote_account(vote: &str, node: &str, stake: u64) -> RawVoteAccount {
    RawVoteAccount {
        vote_pubkey: vote.to_string(),
        node_pubkey: node.to_string(),
        activated_stake: stake,
        epoch_vote_account: true,
        commission: 5,
        last_vote: 2_040,
        root_slot: 2_008,
        epoch_credits: vec![vec![600, 1_200, 800]],
    }
}

fn cluster_node(pubkey: &str, gossip: &str) -> RawClusterNode {
    RawClusterNode {
        pubkey: pubkey.to_string(),
        gossip: Some(gossip.to_string()),
        tpu_quic: Some("10.0.0.9:8009".to_string()),
        version: Some("2.1.0".to_string()),
    }
}

fn cluster() -> ClusterSnapshot {
    ClusterSnapshot {
        epoch: 600,
        slot: 2_048,
        leader_schedule: BTreeMap::from([
            ("node-a".to_string(), vec![0, 1, 2, 3]),
            ("node-b".to_string(), vec![4, 5]),
        ]),
        vote_accounts: RawVoteAccounts {
            current: vec![
                vote_account("vote-a", "node-a", 9_000_000_000),
                vote_account("vote-b", "node-b", 1_000_000_000),
            ],
            delinquent: vec![vote_account("vote-c", "node-c", 0)],
        },
        cluster_nodes: vec![
            cluster_node("node-a", "10.0.0.1:8001"),
            cluster_node("node-b", "10.0.0.2:8001"),
        ],
        block_production: Some(BTreeMap::from([
            ("node-a".to_string(), vec![4, 4]),
            ("node-b".to_string(), vec![2, 1]),
            ("node-z".to_string(), vec![]),
        ])),
    }
}

fn count_rows(warehouse: &Warehouse, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM \"{table}\"");
    warehouse
        .with_read(|connection| {
            connection
                .query_row(&sql, [], |row| row.get(0))
                .map_err(|err| WarehouseError::Db(err.to_string()))
        })
        .unwrap()
}

fn activity_table() -> String {
    FactDataset::new(&VoteAccountActivitySchema).unwrap().table_name().to_string()
}

fn block_production_table() -> String {
    FactDataset::new(&BlockProductionSchema).unwrap().table_name().to_string()
}

struct StaticCluster {
    data: Mutex<Result<ClusterSnapshot, SourceError>>,
}

impl StaticCluster {
    fn new(data: ClusterSnapshot) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(Ok(data)),
        })
    }

    fn set(&self, data: Result<ClusterSnapshot, SourceError>) {
        *self.data.lock().unwrap() = data;
    }
}

#[async_trait]
impl ClusterSource for StaticCluster {
    async fn cluster_snapshot(&self) -> Result<ClusterSnapshot, SourceError> {
        self.data.lock().unwrap().clone()
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

#[test]
fn replace_and_read_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = ValidatorStore::new(open(&dir)).unwrap();
    let snapshot = convert_cluster_snapshot(&cluster());

    store.replace_leader_schedule(&snapshot.leader_schedule, None).unwrap();
    store.replace_vote_accounts(&snapshot.vote_accounts, None).unwrap();
    store.replace_gossip_nodes(&snapshot.gossip_nodes, None).unwrap();

    let mut schedule = store.current_leader_schedule().unwrap();
    schedule.sort_by(|left, right| left.node_pubkey.cmp(&right.node_pubkey));
    assert_eq!(schedule, snapshot.leader_schedule);

    let mut accounts = store.current_vote_accounts().unwrap();
    accounts.sort_by(|left, right| left.vote_pubkey.cmp(&right.vote_pubkey));
    assert_eq!(accounts, snapshot.vote_accounts);

    let mut nodes = store.current_gossip_nodes().unwrap();
    nodes.sort_by(|left, right| left.pubkey.cmp(&right.pubkey));
    assert_eq!(nodes, snapshot.gossip_nodes);
}

#[test]
fn replace_tombstones_missing_vote_accounts() {
    let dir = TempDir::new().unwrap();
    let store = ValidatorStore::new(open(&dir)).unwrap();
    let snapshot = convert_cluster_snapshot(&cluster());

    let first = store.replace_vote_accounts(&snapshot.vote_accounts, None).unwrap();
    assert_eq!(first.inserted, 2);

    let second = store.replace_vote_accounts(&snapshot.vote_accounts[.. 1], None).unwrap();
    assert_eq!(second.tombstoned, 1);
    assert_eq!(second.unchanged, 1);

    let accounts = store.current_vote_accounts().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].vote_pubkey, "vote-a");
}

#[test]
fn new_epoch_versions_every_vote_account() {
    let dir = TempDir::new().unwrap();
    let store = ValidatorStore::new(open(&dir)).unwrap();
    let mut data = cluster();
    store.replace_vote_accounts(&convert_cluster_snapshot(&data).vote_accounts, None).unwrap();

    data.epoch = 601;
    let next = store
        .replace_vote_accounts(&convert_cluster_snapshot(&data).vote_accounts, None)
        .unwrap();
    assert_eq!(next.changed, 2);
    assert!(store.current_vote_accounts().unwrap().iter().all(|account| account.epoch == 601));
}

// ============================================================================
// SECTION: Refresh
// ============================================================================

#[tokio::test]
async fn refresh_writes_dimensions_and_activity() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let store = ValidatorStore::new(warehouse.clone()).unwrap();
    let refresher = ValidatorsRefresher::new(StaticCluster::new(cluster()), store.clone());

    let report = refresher.refresh().await.unwrap();
    // 2 leaders + 2 vote accounts + 2 gossip nodes + 3 activity samples.
    assert_eq!(report.rows_written, 9);
    assert_eq!(store.current_gossip_nodes().unwrap().len(), 2);
    assert_eq!(count_rows(&warehouse, &activity_table()), 3);

    let again = refresher.refresh().await.unwrap();
    assert_eq!(again.rows_written, 3, "unchanged dimensions only add activity samples");
    assert_eq!(count_rows(&warehouse, &activity_table()), 6);
}

#[tokio::test]
async fn empty_required_sets_abort_without_writing() {
    let dir = TempDir::new().unwrap();
    let store = ValidatorStore::new(open(&dir)).unwrap();

    for set in ["leader schedule", "vote accounts", "gossip nodes"] {
        let mut data = cluster();
        match set {
            "leader schedule" => data.leader_schedule.clear(),
            "vote accounts" => data.vote_accounts.current.clear(),
            _ => data.cluster_nodes.clear(),
        }
        let refresher = ValidatorsRefresher::new(StaticCluster::new(data), store.clone());
        let err = refresher.refresh().await.unwrap_err();
        assert_eq!(
            err,
            RefreshError::Unsafe(format!(
                "refusing to write snapshot: source returned no {set} (possible source issue)"
            ))
        );
    }

    assert!(store.current_leader_schedule().unwrap().is_empty());
    assert!(store.current_vote_accounts().unwrap().is_empty());
    assert!(store.current_gossip_nodes().unwrap().is_empty());
}

#[tokio::test]
async fn source_failure_keeps_last_snapshot() {
    let dir = TempDir::new().unwrap();
    let store = ValidatorStore::new(open(&dir)).unwrap();
    let source = StaticCluster::new(cluster());
    let refresher = ValidatorsRefresher::new(source.clone(), store.clone());

    refresher.refresh().await.unwrap();
    source.set(Err(SourceError::new("rpc unavailable")));
    let err = refresher.refresh().await.unwrap_err();
    assert_eq!(err, RefreshError::Source("rpc unavailable".to_string()));
    assert_eq!(store.current_vote_accounts().unwrap().len(), 2);
}

#[tokio::test]
async fn block_production_skips_malformed_entries() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let store = ValidatorStore::new(warehouse.clone()).unwrap();
    let source = StaticCluster::new(cluster());
    let refresher = BlockProductionRefresher::new(source.clone(), store);

    let report = refresher.refresh().await.unwrap();
    assert_eq!(report.rows_written, 2);
    assert_eq!(count_rows(&warehouse, &block_production_table()), 2);

    source.set(Ok(ClusterSnapshot {
        block_production: None,
        ..cluster()
    }));
    assert_eq!(refresher.refresh().await.unwrap().rows_written, 0);
    assert_eq!(count_rows(&warehouse, &block_production_table()), 2);
}

#[tokio::test]
async fn json_file_source_reads_cluster_export() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cluster.json");
    std::fs::write(&path, serde_json::to_vec(&cluster()).unwrap()).unwrap();

    let source = JsonFileClusterSource::new(&path);
    assert_eq!(source.cluster_snapshot().await.unwrap(), cluster());

    std::fs::write(&path, b"{\"epoch\": \"six\"}").unwrap();
    let err = source.cluster_snapshot().await.unwrap_err();
    assert!(err.to_string().starts_with("invalid cluster snapshot"));

    let missing = JsonFileClusterSource::new(dir.path().join("missing.json"));
    let err = missing.cluster_snapshot().await.unwrap_err();
    assert!(err.to_string().starts_with("failed to read"));
}

// ============================================================================
// SECTION: Indexer Wiring
// ============================================================================

#[tokio::test]
async fn indexer_builds_validator_views_from_cluster_source() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let config = IndexerConfig {
        serviceability_interval: Duration::from_secs(60),
        usage: None,
        validators: Some(ValidatorsViewConfig {
            interval: Duration::from_secs(60),
            block_production_interval: Duration::from_secs(3600),
        }),
    };
    let serviceability = Arc::new(JsonFileServiceabilitySource::new(dir.path().join("p.json")));

    let missing = IndexerSources {
        serviceability: serviceability.clone(),
        counters: None,
        cluster: None,
    };
    let err = Indexer::new(&warehouse, missing, config, Arc::new(NoopViewMetrics))
        .err()
        .unwrap();
    assert!(err.to_string().contains("no cluster source"));

    let sources = IndexerSources {
        serviceability,
        counters: None,
        cluster: Some(StaticCluster::new(cluster())),
    };
    let indexer = Indexer::new(&warehouse, sources, config, Arc::new(NoopViewMetrics)).unwrap();
    let validators = indexer.validators().unwrap();
    validators.safe_refresh().await.unwrap();
    assert!(validators.is_ready());
    assert!(indexer.block_production().is_some());
}
