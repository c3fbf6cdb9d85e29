// crates/lake-core/src/lib.rs
// ============================================================================
// Module: Lake Core Library
// Description: Public API surface for Lake core types.
// Purpose: Expose values, schemas, key derivation, and identifiers.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Lake core holds the backend-agnostic pieces of the versioned dimension
//! warehouse: cell values, `name:TYPE` schema parsing, the surrogate key
//! deriver, payload hashing, and write identifiers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::core::*;
