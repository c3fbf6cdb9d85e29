// crates/lake-indexer/src/validators/source.rs
// ============================================================================
// Module: Cluster Sources
// Description: Providers of raw cluster snapshots.
// Purpose: Abstract the cluster RPC client so refreshes can be driven by files.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! [`ClusterSource`] returns one [`ClusterSnapshot`] per call.
//! [`JsonFileClusterSource`] re-reads a JSON export on every call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::serviceability::source::read_limited;
use crate::validators::types::ClusterSnapshot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted cluster snapshot file size in bytes.
pub const MAX_CLUSTER_FILE_SIZE: usize = 128 * 1024 * 1024;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Source of cluster snapshots.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Fetches the current cluster snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the snapshot cannot be fetched.
    async fn cluster_snapshot(&self) -> Result<ClusterSnapshot, SourceError>;
}

// ============================================================================
// SECTION: JSON File Source
// ============================================================================

/// Reads cluster snapshots from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileClusterSource {
    /// Snapshot file path.
    path: PathBuf,
}

impl JsonFileClusterSource {
    /// Creates a source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Returns the snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ClusterSource for JsonFileClusterSource {
    async fn cluster_snapshot(&self) -> Result<ClusterSnapshot, SourceError> {
        let bytes = read_limited(&self.path, MAX_CLUSTER_FILE_SIZE).await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            SourceError::new(format!("invalid cluster snapshot {}: {err}", self.path.display()))
        })
    }
}
