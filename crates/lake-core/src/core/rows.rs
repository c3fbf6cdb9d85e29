// crates/lake-core/src/core/rows.rs
// ============================================================================
// Module: Lake Row Production
// Description: Row producer result types shared by dataset writers.
// Purpose: Give row callbacks a uniform error surface.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Writers pull rows by index from caller-supplied producers. A producer
//! returns the row's values in schema order or a [`RowSourceError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::value::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Error raised by a row producer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RowSourceError(pub String);

impl RowSourceError {
    /// Creates a producer error from any displayable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of producing one row.
pub type RowResult = Result<Vec<Value>, RowSourceError>;
