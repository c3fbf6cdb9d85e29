// crates/lake-indexer/src/usage/source.rs
// ============================================================================
// Module: Counter Sources
// Description: Providers of raw interface counter samples.
// Purpose: Abstract the telemetry query so refreshes can be driven by files.
// Dependencies: async-trait, serde_json, time
// ============================================================================

//! ## Overview
//! [`CounterSource::samples`] returns every sample with `start <= time < end`
//! in any order. [`JsonFileCounterSource`] reads a JSON array of samples and
//! filters it by time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::SourceError;
use crate::serviceability::source::read_limited;
use crate::usage::convert::parse_sample_time;
use crate::usage::types::CounterSample;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted counter file size in bytes.
pub const MAX_COUNTER_FILE_SIZE: usize = 256 * 1024 * 1024;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Source of interface counter samples.
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Fetches samples in `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the query fails.
    async fn samples(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<CounterSample>, SourceError>;
}

// ============================================================================
// SECTION: JSON File Source
// ============================================================================

/// Reads counter samples from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileCounterSource {
    /// Sample file path.
    path: PathBuf,
}

impl JsonFileCounterSource {
    /// Creates a source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Returns the sample file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CounterSource for JsonFileCounterSource {
    async fn samples(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<CounterSample>, SourceError> {
        let bytes = read_limited(&self.path, MAX_COUNTER_FILE_SIZE).await?;
        let samples: Vec<CounterSample> = serde_json::from_slice(&bytes).map_err(|err| {
            SourceError::new(format!("invalid counter samples {}: {err}", self.path.display()))
        })?;
        Ok(samples
            .into_iter()
            .filter(|sample| {
                parse_sample_time(&sample.time).is_some_and(|time| time >= start && time < end)
            })
            .collect())
    }
}
