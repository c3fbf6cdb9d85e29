// crates/lake-store-sqlite/src/lib.rs
// ============================================================================
// Module: Lake SQLite Warehouse Library
// Description: SQLite-backed versioned dimensions and append-only facts.
// Purpose: Expose the warehouse client and dataset engines.
// Dependencies: lake-core, rusqlite, serde, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! The warehouse persists entity snapshots as SCD2 history and event rows as
//! append-only facts in a single `SQLite` database.
//! Invariants:
//! - History and fact rows are only ever inserted (fact upserts excepted for
//!   replacing relations).
//! - Dataset layouts are fixed once recorded in the catalog.
//! - Reads use the read pool and never wait on the write connection.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod codec;
pub mod dimension;
pub mod fact;
pub mod warehouse;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dimension::DimensionDataset;
pub use dimension::DimensionRow;
pub use dimension::DimensionWriteConfig;
pub use dimension::WriteSummary;
pub use fact::DEFAULT_FACT_BATCH_SIZE;
pub use fact::FactDataset;
pub use warehouse::CatalogEntry;
pub use warehouse::DEFAULT_STAGING_BATCH_SIZE;
pub use warehouse::DatasetKind;
pub use warehouse::JournalMode;
pub use warehouse::SyncMode;
pub use warehouse::Warehouse;
pub use warehouse::WarehouseConfig;
pub use warehouse::WarehouseError;
