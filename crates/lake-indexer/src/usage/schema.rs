// crates/lake-indexer/src/usage/schema.rs
// ============================================================================
// Module: Usage Schema
// Description: Fact schema and row codec for interface counters.
// Purpose: Describe `dz_device_interface_counters` to the fact writer.
// Dependencies: lake-core
// ============================================================================

//! ## Overview
//! Interface counters are an append-only fact partitioned by `event_ts`.
//! Column order: identity columns, the eight counters, their deltas, then
//! `delta_duration`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lake_core::FactSchema;
use lake_core::RowResult;
use lake_core::Value;
use lake_core::to_unix_millis;
use time::OffsetDateTime;

use crate::usage::types::InterfaceUsage;

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Fact name of the interface counter relation.
pub const INTERFACE_COUNTERS_FACT: &str = "dz_device_interface_counters";

/// Declared columns of the interface counter relation.
const COLUMNS: &[&str] = &[
    "event_ts:TIMESTAMP",
    "ingested_at:TIMESTAMP",
    "device_pk:VARCHAR",
    "host:VARCHAR",
    "intf:VARCHAR",
    "user_tunnel_id:BIGINT",
    "link_pk:VARCHAR",
    "link_side:VARCHAR",
    "in_octets:BIGINT",
    "out_octets:BIGINT",
    "in_pkts:BIGINT",
    "out_pkts:BIGINT",
    "in_errors:BIGINT",
    "out_errors:BIGINT",
    "in_discards:BIGINT",
    "out_discards:BIGINT",
    "in_octets_delta:BIGINT",
    "out_octets_delta:BIGINT",
    "in_pkts_delta:BIGINT",
    "out_pkts_delta:BIGINT",
    "in_errors_delta:BIGINT",
    "out_errors_delta:BIGINT",
    "in_discards_delta:BIGINT",
    "out_discards_delta:BIGINT",
    "delta_duration:DOUBLE",
];

/// `dz_device_interface_counters` fact schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceCountersSchema;

impl FactSchema for InterfaceCountersSchema {
    fn name(&self) -> &str {
        INTERFACE_COUNTERS_FACT
    }

    fn columns(&self) -> &[&str] {
        COLUMNS
    }

    fn time_column(&self) -> Option<&str> {
        Some("event_ts")
    }

    fn partition_by_time(&self) -> bool {
        true
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Encodes a usage row in column order.
///
/// # Errors
///
/// Never fails today; returns [`RowResult`] to match the writer contract.
pub fn usage_row(usage: &InterfaceUsage, ingested_at: OffsetDateTime) -> RowResult {
    let mut row = Vec::with_capacity(COLUMNS.len());
    row.push(Value::Int(to_unix_millis(usage.event_ts)));
    row.push(Value::Int(to_unix_millis(ingested_at)));
    row.push(optional_text(usage.device_pk.as_deref()));
    row.push(optional_text(usage.host.as_deref()));
    row.push(optional_text(usage.intf.as_deref()));
    row.push(optional_int(usage.user_tunnel_id));
    row.push(optional_text(usage.link_pk.as_deref()));
    row.push(optional_text(usage.link_side.as_deref()));
    row.extend(usage.counters.iter().copied().map(optional_int));
    row.extend(usage.deltas.iter().copied().map(optional_int));
    row.push(usage.delta_duration.map_or(Value::Null, Value::Float));
    Ok(row)
}

/// Maps an optional string to text or NULL.
fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

/// Maps an optional integer to int or NULL.
fn optional_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Int)
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

    use lake_core::FactLayout;
    use time::macros::datetime;

    use super::*;
    use crate::usage::types::COUNTER_COUNT;

    #[test]
    fn row_width_matches_layout() {
        let layout = FactLayout::from_schema(&InterfaceCountersSchema).unwrap();
        assert_eq!(layout.table_name(), "fact_dz_device_interface_counters");
        let usage = InterfaceUsage {
            event_ts: datetime!(2024-05-01 00:00:00 UTC),
            device_pk: Some("dev1".to_string()),
            host: None,
            intf: Some("Tunnel501".to_string()),
            user_tunnel_id: Some(501),
            link_pk: None,
            link_side: None,
            counters: [Some(1); COUNTER_COUNT],
            deltas: [None; COUNTER_COUNT],
            delta_duration: Some(60.0),
        };
        let row = usage_row(&usage, datetime!(2024-05-01 00:01:00 UTC)).unwrap();
        assert_eq!(row.len(), layout.columns().len());
        assert_eq!(row[0], Value::Int(1_714_521_600_000));
        assert_eq!(row[3], Value::Null);
        assert_eq!(row[5], Value::Int(501));
        assert_eq!(row[24], Value::Float(60.0));
    }
}
