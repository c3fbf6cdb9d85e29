// crates/lake-indexer/src/lib.rs
// ============================================================================
// Module: Lake Indexer Library
// Description: Domain adapters, stores, and refresh orchestration.
// Purpose: Turn external snapshots into warehouse history on a schedule.
// Dependencies: lake-core, lake-store-sqlite, tokio, tracing
// ============================================================================

//! ## Overview
//! Each domain (serviceability topology, interface usage, validator set)
//! contributes a source trait, typed schemas, a store facade, and a
//! [`Refresher`]. A [`View`] drives one refresher on an interval with
//! overlap protection, panic containment, and a readiness latch. The [`Indexer`] wires the
//! views together over one [`lake_store_sqlite::Warehouse`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod indexer;
pub mod metrics;
pub mod readiness;
pub mod serviceability;
pub mod usage;
pub mod validators;
pub mod view;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::IndexerError;
pub use error::SourceError;
pub use error::StoreError;
pub use indexer::Indexer;
pub use indexer::IndexerConfig;
pub use indexer::IndexerSources;
pub use indexer::UsageViewConfig;
pub use indexer::ValidatorsViewConfig;
pub use metrics::NoopViewMetrics;
pub use metrics::RefreshOutcome;
pub use metrics::ViewMetrics;
pub use readiness::ReadinessError;
pub use readiness::ReadinessGate;
pub use view::RefreshError;
pub use view::RefreshReport;
pub use view::Refresher;
pub use view::View;
pub use view::run_blocking;
