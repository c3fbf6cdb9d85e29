// crates/lake-indexer/src/serviceability/mod.rs
// ============================================================================
// Module: Serviceability Domain
// Description: Network topology dimensions and their refresh.
// Purpose: Group the serviceability types, codecs, store, and refresher.
// Dependencies: crate modules
// ============================================================================

//! ## Overview
//! The serviceability domain snapshots the network topology (contributors,
//! devices, users, metros, links, multicast groups) into versioned
//! dimensions.

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

pub use refresher::SERVICEABILITY_VIEW;
pub use refresher::ServiceabilityRefresher;
pub use refresher::check_snapshot;
pub use schema::DimensionRecord;
pub use schema::TOPOLOGY_SCHEMAS;
pub use schema::schema_by_name;
pub use source::JsonFileServiceabilitySource;
pub use source::ServiceabilitySource;
pub use store::ServiceabilityStore;
pub use types::Contributor;
pub use types::Device;
pub use types::Interface;
pub use types::Link;
pub use types::Metro;
pub use types::MulticastGroup;
pub use types::ProgramData;
pub use types::ServiceabilitySnapshot;
pub use types::User;
