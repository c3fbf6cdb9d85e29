// crates/lake-indexer/src/readiness.rs
// ============================================================================
// Module: Readiness Gate
// Description: One-way NotReady -> Ready latch shared between views.
// Purpose: Let dependent views block until a prerequisite first loads.
// Dependencies: thiserror, tokio
// ============================================================================

//! ## Overview
//! A [`ReadinessGate`] wraps a `watch` channel holding a single boolean.
//! [`ReadinessGate::mark_ready`] flips it once; it never flips back. Clones
//! share the same latch, so a dependent view can hold a clone of its
//! prerequisite's gate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while waiting for readiness.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadinessError {
    /// The view did not become ready in time.
    #[error("timed out after {waited_ms} ms waiting for view {view}")]
    Timeout {
        /// View name.
        view: String,
        /// Time waited in milliseconds.
        waited_ms: u128,
    },
    /// The gate was dropped before becoming ready.
    #[error("view {0} shut down before becoming ready")]
    Closed(String),
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Latched readiness signal.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    /// View name used in errors.
    name: Arc<str>,
    /// Shared latch.
    sender: Arc<watch::Sender<bool>>,
}

impl ReadinessGate {
    /// Creates a gate in the not-ready state.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            name: Arc::from(name),
            sender: Arc::new(sender),
        }
    }

    /// Returns the view name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latches the gate. Returns true only for the call that flipped it.
    pub fn mark_ready(&self) -> bool {
        self.sender.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    /// Returns true once the gate has latched.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.sender.borrow()
    }

    /// Waits until the gate latches or `timeout` elapses.
    ///
    /// Returns immediately when already ready.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError::Timeout`] when the deadline passes first.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), ReadinessError> {
        let mut receiver = self.sender.subscribe();
        match tokio::time::timeout(timeout, receiver.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ReadinessError::Closed(self.name.to_string())),
            Err(_) => Err(ReadinessError::Timeout {
                view: self.name.to_string(),
                waited_ms: timeout.as_millis(),
            }),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
