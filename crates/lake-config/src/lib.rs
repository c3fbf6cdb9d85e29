// crates/lake-config/src/lib.rs
// ============================================================================
// Module: Lake Config Library
// Description: Canonical config model and validation for lake.toml.
// Purpose: Single source of truth for runtime configuration semantics.
// Dependencies: lake-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `lake-config` defines the configuration model for the warehouse and its
//! refresh views. Loading enforces size and path limits and validation fails
//! closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
