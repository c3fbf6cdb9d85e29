// crates/lake-indexer/src/usage/types.rs
// ============================================================================
// Module: Usage Types
// Description: Interface counter samples and derived usage rows.
// Purpose: Model raw counter telemetry and the stored per-interval facts.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Counters are cumulative, so each stored row carries both the raw value
//! and the delta since the previous sample of the same interface. Error and
//! discard counters are *sparse*: devices only report them when they change,
//! so gaps are forward-filled from the last known value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Number of tracked interface counters.
pub const COUNTER_COUNT: usize = 8;

/// Per-counter values indexed by [`Counter::index`].
pub type CounterValues = [Option<i64>; COUNTER_COUNT];

/// Tracked interface counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Counter {
    /// Octets received.
    InOctets,
    /// Octets sent.
    OutOctets,
    /// Packets received.
    InPkts,
    /// Packets sent.
    OutPkts,
    /// Receive errors.
    InErrors,
    /// Transmit errors.
    OutErrors,
    /// Receive discards.
    InDiscards,
    /// Transmit discards.
    OutDiscards,
}

impl Counter {
    /// Every counter in column order.
    pub const ALL: [Self; COUNTER_COUNT] = [
        Self::InOctets,
        Self::OutOctets,
        Self::InPkts,
        Self::OutPkts,
        Self::InErrors,
        Self::OutErrors,
        Self::InDiscards,
        Self::OutDiscards,
    ];

    /// Returns the stored column name.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::InOctets => "in_octets",
            Self::OutOctets => "out_octets",
            Self::InPkts => "in_pkts",
            Self::OutPkts => "out_pkts",
            Self::InErrors => "in_errors",
            Self::OutErrors => "out_errors",
            Self::InDiscards => "in_discards",
            Self::OutDiscards => "out_discards",
        }
    }

    /// Returns true for counters only reported on change.
    #[must_use]
    pub const fn is_sparse(self) -> bool {
        matches!(self, Self::InErrors | Self::OutErrors | Self::InDiscards | Self::OutDiscards)
    }

    /// Returns the position in [`CounterValues`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

// ============================================================================
// SECTION: Samples
// ============================================================================

/// One raw counter sample as reported by telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSample {
    /// RFC 3339 sample time; samples with unparseable times are skipped.
    pub time: String,
    /// Device public key.
    #[serde(default)]
    pub device_pk: Option<String>,
    /// Device host name.
    #[serde(default)]
    pub host: Option<String>,
    /// Interface name.
    #[serde(default)]
    pub intf: Option<String>,
    /// Octets received.
    #[serde(default)]
    pub in_octets: Option<i64>,
    /// Octets sent.
    #[serde(default)]
    pub out_octets: Option<i64>,
    /// Packets received.
    #[serde(default)]
    pub in_pkts: Option<i64>,
    /// Packets sent.
    #[serde(default)]
    pub out_pkts: Option<i64>,
    /// Receive errors.
    #[serde(default)]
    pub in_errors: Option<i64>,
    /// Transmit errors.
    #[serde(default)]
    pub out_errors: Option<i64>,
    /// Receive discards.
    #[serde(default)]
    pub in_discards: Option<i64>,
    /// Transmit discards.
    #[serde(default)]
    pub out_discards: Option<i64>,
}

impl CounterSample {
    /// Returns the reported value of `counter`.
    #[must_use]
    pub const fn counter(&self, counter: Counter) -> Option<i64> {
        match counter {
            Counter::InOctets => self.in_octets,
            Counter::OutOctets => self.out_octets,
            Counter::InPkts => self.in_pkts,
            Counter::OutPkts => self.out_pkts,
            Counter::InErrors => self.in_errors,
            Counter::OutErrors => self.out_errors,
            Counter::InDiscards => self.in_discards,
            Counter::OutDiscards => self.out_discards,
        }
    }
}

// ============================================================================
// SECTION: Usage Rows
// ============================================================================

/// Stored interface usage row.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceUsage {
    /// Sample time.
    pub event_ts: OffsetDateTime,
    /// Device public key.
    pub device_pk: Option<String>,
    /// Device host name.
    pub host: Option<String>,
    /// Interface name.
    pub intf: Option<String>,
    /// User tunnel id parsed from `TunnelNNN` interface names.
    pub user_tunnel_id: Option<i64>,
    /// Link the interface terminates, when known.
    pub link_pk: Option<String>,
    /// Link side (`A` or `Z`), when known.
    pub link_side: Option<String>,
    /// Counter values, forward-filled.
    pub counters: CounterValues,
    /// Deltas against the previous known value.
    pub deltas: CounterValues,
    /// Seconds since the previous sample of the same interface.
    pub delta_duration: Option<f64>,
}

/// Link endpoint identified by `device_pk:intf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    /// Link public key.
    pub link_pk: String,
    /// Link side (`A` or `Z`).
    pub link_side: String,
}

/// Latest stored sparse counter values per `device_pk:intf`.
pub type CounterBaselines = BTreeMap<String, CounterValues>;

/// Latest stored event time per `device_pk:intf`.
pub type MaxTimestampsByKey = BTreeMap<String, OffsetDateTime>;

/// Extent of the stored usage facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataBoundaries {
    /// Earliest event time, `None` when empty.
    pub min_time: Option<OffsetDateTime>,
    /// Latest event time, `None` when empty.
    pub max_time: Option<OffsetDateTime>,
    /// Stored row count.
    pub row_count: u64,
}

/// Builds the `device_pk:intf` tracking key.
#[must_use]
pub fn interface_key(device_pk: &str, intf: &str) -> String {
    format!("{device_pk}:{intf}")
}
