// crates/lake-indexer/src/usage/mod.rs
// ============================================================================
// Module: Usage Domain
// Description: Interface counter facts and their incremental refresh.
// Purpose: Group the usage types, codec, store, and refresher.
// Dependencies: crate modules
// ============================================================================

//! ## Overview
//! The usage domain appends per-interface counter samples, with deltas, to
//! the `dz_device_interface_counters` fact. It depends on the serviceability
//! domain for link lookups.

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

pub use convert::build_link_lookup;
pub use convert::convert_samples;
pub use refresher::USAGE_VIEW;
pub use refresher::UsageRefresher;
pub use refresher::UsageSettings;
pub use source::CounterSource;
pub use source::JsonFileCounterSource;
pub use store::UsageStore;
pub use types::Counter;
pub use types::CounterSample;
pub use types::DataBoundaries;
pub use types::InterfaceUsage;
