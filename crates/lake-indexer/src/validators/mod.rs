// crates/lake-indexer/src/validators/mod.rs
// ============================================================================
// Module: Validators Domain
// Description: Validator set dimensions, activity facts, and their refresh.
// Purpose: Group the validator types, codecs, store, and refreshers.
// Dependencies: crate modules
// ============================================================================

//! ## Overview
//! The validators domain snapshots the cluster's validator set (leader
//! schedule, vote accounts, gossip nodes) into versioned dimensions and
//! appends vote account activity and block production samples as facts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod convert;
pub mod refresher;
pub mod schema;
pub mod source;
pub mod store;
pub mod types;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use refresher::BLOCK_PRODUCTION_VIEW;
pub use refresher::BlockProductionRefresher;
pub use refresher::VALIDATORS_VIEW;
pub use refresher::ValidatorsRefresher;
pub use refresher::check_cluster_snapshot;
pub use schema::VALIDATOR_SCHEMAS;
pub use schema::schema_by_name;
pub use source::ClusterSource;
pub use source::JsonFileClusterSource;
pub use store::ValidatorStore;
pub use types::BlockProduction;
pub use types::ClusterSnapshot;
pub use types::GossipNode;
pub use types::LeaderScheduleEntry;
pub use types::RawClusterNode;
pub use types::RawVoteAccount;
pub use types::RawVoteAccounts;
pub use types::VoteAccount;
pub use types::VoteAccountActivity;
