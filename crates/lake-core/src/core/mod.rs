// crates/lake-core/src/core/mod.rs
// ============================================================================
// Module: Lake Core Types
// Description: Values, schemas, identifiers, and hashing for Lake datasets.
// Purpose: Provide backend-agnostic building blocks for the warehouse engines.
// Dependencies: serde, sha2, thiserror, time, uuid
// ============================================================================

//! ## Overview
//! Core types describe what a dataset looks like and how entities are keyed.
//! Storage engines consume these types; they never define their own.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cancel;
pub mod hashing;
pub mod identifiers;
pub mod rows;
pub mod schema;
pub mod timestamps;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cancel::CancelToken;
pub use hashing::NaturalKey;
pub use hashing::attrs_hash;
pub use hashing::surrogate_key;
pub use identifiers::OpId;
pub use identifiers::SurrogateKey;
pub use rows::RowResult;
pub use rows::RowSourceError;
pub use schema::ColumnSpec;
pub use schema::ColumnType;
pub use schema::DedupMode;
pub use schema::DimensionLayout;
pub use schema::DimensionSchema;
pub use schema::FactLayout;
pub use schema::FactSchema;
pub use schema::SchemaError;
pub use timestamps::TimestampRangeError;
pub use timestamps::from_unix_millis;
pub use timestamps::now_millis;
pub use timestamps::to_unix_millis;
pub use timestamps::truncate_to_millis;
pub use value::Value;
