// crates/lake-indexer/src/usage/convert.rs
// ============================================================================
// Module: Usage Conversion
// Description: Raw counter samples -> usage rows with deltas.
// Purpose: Forward-fill sparse counters and compute per-interval deltas.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Samples are processed in time order and tracked per `device_pk:intf`.
//!
//! ## Invariants
//! - Sparse counters start from the stored baseline when one exists.
//! - The first sample of an interface that reports any non-sparse counter
//!   only seeds last-known values and is not emitted.
//! - Missing values are forward-filled from the last known value.
//! - Samples at or before the latest stored event of their interface update
//!   tracking state but are not emitted again.
//! - Samples without a device or interface are emitted as reported, without
//!   deltas.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::serviceability::types::Link;
use crate::usage::types::COUNTER_COUNT;
use crate::usage::types::Counter;
use crate::usage::types::CounterBaselines;
use crate::usage::types::CounterSample;
use crate::usage::types::CounterValues;
use crate::usage::types::InterfaceUsage;
use crate::usage::types::LinkInfo;
use crate::usage::types::MaxTimestampsByKey;
use crate::usage::types::interface_key;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Interface name prefix of user tunnels.
const TUNNEL_PREFIX: &str = "Tunnel";

// ============================================================================
// SECTION: Conversion
// ============================================================================

/// Per-interface tracking state.
#[derive(Debug, Default)]
struct InterfaceState {
    /// Last known value per counter.
    last_known: CounterValues,
    /// Whether the interface's first sample was consumed.
    first_seen: bool,
    /// Time of the previous sample.
    last_time: Option<OffsetDateTime>,
}

impl InterfaceState {
    /// Builds state seeded with sparse baselines.
    fn seeded(baseline: Option<&CounterValues>) -> Self {
        let mut state = Self::default();
        if let Some(baseline) = baseline {
            for counter in Counter::ALL.into_iter().filter(|counter| counter.is_sparse()) {
                state.last_known[counter.index()] = baseline[counter.index()];
            }
        }
        state
    }
}

/// Converts raw samples into usage rows.
#[must_use]
pub fn convert_samples(
    samples: &[CounterSample],
    baselines: &CounterBaselines,
    links: &BTreeMap<String, LinkInfo>,
    already_written: &MaxTimestampsByKey,
) -> Vec<InterfaceUsage> {
    let mut timed: Vec<(OffsetDateTime, &CounterSample)> = samples
        .iter()
        .filter_map(|sample| parse_sample_time(&sample.time).map(|time| (time, sample)))
        .collect();
    timed.sort_by_key(|(time, _)| *time);

    let mut states: BTreeMap<String, InterfaceState> = BTreeMap::new();
    let mut usage = Vec::with_capacity(timed.len());
    for (time, sample) in timed {
        let reported: CounterValues = Counter::ALL.map(|counter| sample.counter(counter));
        let mut row = InterfaceUsage {
            event_ts: time,
            device_pk: sample.device_pk.clone(),
            host: sample.host.clone(),
            intf: sample.intf.clone(),
            user_tunnel_id: sample.intf.as_deref().and_then(tunnel_id),
            link_pk: None,
            link_side: None,
            counters: reported,
            deltas: [None; COUNTER_COUNT],
            delta_duration: None,
        };
        let (Some(device_pk), Some(intf)) = (&sample.device_pk, &sample.intf) else {
            usage.push(row);
            continue;
        };
        let key = interface_key(device_pk, intf);
        if let Some(link) = links.get(&key) {
            row.link_pk = Some(link.link_pk.clone());
            row.link_side = Some(link.link_side.clone());
        }
        let already_stored = already_written.get(&key).is_some_and(|max| time <= *max);
        let state = states
            .entry(key)
            .or_insert_with_key(|key| InterfaceState::seeded(baselines.get(key)));

        if !state.first_seen {
            state.first_seen = true;
            let has_dense = Counter::ALL
                .into_iter()
                .any(|counter| !counter.is_sparse() && reported[counter.index()].is_some());
            if has_dense {
                for counter in Counter::ALL.into_iter().filter(|counter| !counter.is_sparse()) {
                    if let Some(value) = reported[counter.index()] {
                        state.last_known[counter.index()] = Some(value);
                    }
                }
                state.last_time = Some(time);
                continue;
            }
        }

        for counter in Counter::ALL {
            let index = counter.index();
            let previous = state.last_known[index];
            let current = reported[index].or(previous);
            row.counters[index] = current;
            if let Some(current) = current {
                row.deltas[index] = previous.map(|previous| current.saturating_sub(previous));
                state.last_known[index] = Some(current);
            }
        }
        row.delta_duration = state.last_time.map(|last| (time - last).as_seconds_f64());
        state.last_time = Some(time);

        if !already_stored {
            usage.push(row);
        }
    }
    usage
}

// ============================================================================
// SECTION: Lookups
// ============================================================================

/// Maps `device_pk:intf` of each link side to its link.
///
/// Sides with an empty device or interface are skipped.
#[must_use]
pub fn build_link_lookup(links: &[Link]) -> BTreeMap<String, LinkInfo> {
    let mut lookup = BTreeMap::new();
    for link in links {
        for (device_pk, intf, side) in [
            (&link.side_a_pk, &link.side_a_iface_name, "A"),
            (&link.side_z_pk, &link.side_z_iface_name, "Z"),
        ] {
            if device_pk.is_empty() || intf.is_empty() {
                continue;
            }
            lookup.insert(
                interface_key(device_pk, intf),
                LinkInfo {
                    link_pk: link.pk.clone(),
                    link_side: side.to_string(),
                },
            );
        }
    }
    lookup
}

/// Parses the numeric suffix of a `TunnelNNN` interface name.
#[must_use]
pub fn tunnel_id(intf: &str) -> Option<i64> {
    intf.strip_prefix(TUNNEL_PREFIX)
        .filter(|suffix| !suffix.is_empty())
        .and_then(|suffix| suffix.parse().ok())
}

/// Parses an RFC 3339 sample time.
#[must_use]
pub fn parse_sample_time(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    #[test]
    fn tunnel_id_requires_numeric_suffix() {
        assert_eq!(tunnel_id("Tunnel501"), Some(501));
        assert_eq!(tunnel_id("Tunnel"), None);
        assert_eq!(tunnel_id("TunnelX"), None);
        assert_eq!(tunnel_id("Ethernet1"), None);
    }

    #[test]
    fn sample_time_accepts_rfc3339_only() {
        assert!(parse_sample_time("2024-05-01T00:00:00Z").is_some());
        assert!(parse_sample_time("2024-05-01T00:00:00.123456789+02:00").is_some());
        assert!(parse_sample_time("yesterday").is_none());
    }
}
