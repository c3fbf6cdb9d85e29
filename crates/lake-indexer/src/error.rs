// crates/lake-indexer/src/error.rs
// ============================================================================
// Module: Indexer Errors
// Description: Error types shared by domain stores, sources, and wiring.
// Purpose: Keep one string-payload error surface per indexer boundary.
// Dependencies: lake-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! Domain stores wrap warehouse failures in [`StoreError`]; snapshot sources
//! report [`SourceError`]; [`IndexerError`] covers construction and wiring.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lake_store_sqlite::WarehouseError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Domain store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Warehouse operation failed.
    #[error("{0}")]
    Warehouse(String),
    /// Record could not be encoded into a row.
    #[error("encode error: {0}")]
    Encode(String),
    /// Stored row could not be decoded into a record.
    #[error("decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// Prefixes the message with `context`, keeping the variant.
    #[must_use]
    pub fn context(self, context: &str) -> Self {
        match self {
            Self::Warehouse(message) => Self::Warehouse(format!("{context}: {message}")),
            Self::Encode(message) => Self::Encode(format!("{context}: {message}")),
            Self::Decode(message) => Self::Decode(format!("{context}: {message}")),
        }
    }
}

impl From<WarehouseError> for StoreError {
    fn from(error: WarehouseError) -> Self {
        Self::Warehouse(error.to_string())
    }
}

/// External source failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SourceError(pub String);

impl SourceError {
    /// Creates a source error from any message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Indexer construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexerError {
    /// Configuration is invalid.
    #[error("invalid indexer configuration: {0}")]
    Invalid(String),
    /// Store construction failed.
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for IndexerError {
    fn from(error: StoreError) -> Self {
        Self::Store(error.to_string())
    }
}
