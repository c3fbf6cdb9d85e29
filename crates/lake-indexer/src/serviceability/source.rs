// crates/lake-indexer/src/serviceability/source.rs
// ============================================================================
// Module: Serviceability Sources
// Description: Providers of raw serviceability program snapshots.
// Purpose: Abstract the program client so refreshes can be driven by files.
// Dependencies: async-trait, serde_json, tokio
// ============================================================================

//! ## Overview
//! [`ServiceabilitySource`] returns one full [`ProgramData`] snapshot per
//! call. [`JsonFileServiceabilitySource`] reads a JSON export from disk on
//! every call, so replacing the file changes the next snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::serviceability::types::ProgramData;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted snapshot file size in bytes.
pub const MAX_SNAPSHOT_FILE_SIZE: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Source of serviceability program snapshots.
#[async_trait]
pub trait ServiceabilitySource: Send + Sync {
    /// Fetches the full program snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the snapshot cannot be fetched.
    async fn program_data(&self) -> Result<ProgramData, SourceError>;
}

// ============================================================================
// SECTION: JSON File Source
// ============================================================================

/// Reads program snapshots from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileServiceabilitySource {
    /// Snapshot file path.
    path: PathBuf,
}

impl JsonFileServiceabilitySource {
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
impl ServiceabilitySource for JsonFileServiceabilitySource {
    async fn program_data(&self) -> Result<ProgramData, SourceError> {
        let bytes = read_limited(&self.path, MAX_SNAPSHOT_FILE_SIZE).await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            SourceError::new(format!("invalid program snapshot {}: {err}", self.path.display()))
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a file, rejecting it when larger than `max_bytes`.
///
/// # Errors
///
/// Returns [`SourceError`] when the file is unreadable or too large.
pub(crate) async fn read_limited(path: &Path, max_bytes: usize) -> Result<Vec<u8>, SourceError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| SourceError::new(format!("failed to read {}: {err}", path.display())))?;
    if bytes.len() > max_bytes {
        return Err(SourceError::new(format!(
            "{} exceeds size limit of {max_bytes} bytes",
            path.display()
        )));
    }
    Ok(bytes)
}
