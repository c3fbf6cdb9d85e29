// crates/lake-core/src/core/cancel.rs
// ============================================================================
// Module: Lake Cancellation
// Description: Cooperative cancellation flag for long-running writes.
// Purpose: Let callers stop batch writes between rows and sub-batches.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Writers poll a [`CancelToken`] before every row. Cancellation is one-way
//! and shared by all clones of the token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Cancel Token
// ============================================================================

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Set once cancellation is requested.
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
