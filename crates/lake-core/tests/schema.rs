// crates/lake-core/tests/schema.rs
// ============================================================================
// Module: Schema Layout Tests
// Description: Validation of dimension and fact schema declarations.
// Purpose: Ensure malformed schemas fail at construction.
// Dependencies: lake-core
// ============================================================================
//! ## Overview
//! Exercises [`lake_core::DimensionLayout`] and [`lake_core::FactLayout`]
//! parsing rules.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use lake_core::ColumnType;
use lake_core::DedupMode;
use lake_core::DimensionLayout;
use lake_core::DimensionSchema;
use lake_core::FactLayout;
use lake_core::FactSchema;
use lake_core::SchemaError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

struct Dim {
    name: &'static str,
    pk: &'static [&'static str],
    payload: &'static [&'static str],
}

impl DimensionSchema for Dim {
    fn name(&self) -> &str {
        self.name
    }

    fn primary_key_columns(&self) -> &[&str] {
        self.pk
    }

    fn payload_columns(&self) -> &[&str] {
        self.payload
    }
}

struct Fact {
    columns: &'static [&'static str],
    unique: &'static [&'static str],
    time: Option<&'static str>,
    partition: bool,
    dedup: DedupMode,
    version: Option<&'static str>,
}

impl FactSchema for Fact {
    fn name(&self) -> &str {
        "events"
    }

    fn columns(&self) -> &[&str] {
        self.columns
    }

    fn unique_key_columns(&self) -> &[&str] {
        self.unique
    }

    fn time_column(&self) -> Option<&str> {
        self.time
    }

    fn partition_by_time(&self) -> bool {
        self.partition
    }

    fn dedup_mode(&self) -> DedupMode {
        self.dedup
    }

    fn dedup_version_column(&self) -> Option<&str> {
        self.version
    }
}

fn fact() -> Fact {
    Fact {
        columns: &["event_ts:TIMESTAMP", "key:VARCHAR", "value:DOUBLE", "version:BIGINT"],
        unique: &[],
        time: None,
        partition: false,
        dedup: DedupMode::None,
        version: None,
    }
}

fn invalid(err: SchemaError) -> String {
    match err {
        SchemaError::Invalid(message) => message,
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// SECTION: Dimension Layouts
// ============================================================================

#[test]
fn dimension_layout_derives_relation_names() {
    let layout = DimensionLayout::from_schema(&Dim {
        name: "test_single_pk",
        pk: &["pk:VARCHAR"],
        payload: &["code:VARCHAR", "name:VARCHAR"],
    })
    .unwrap();
    assert_eq!(layout.history_table_name(), "dim_test_single_pk_history");
    assert_eq!(layout.staging_table_name(), "stg_dim_test_single_pk_snapshot");
    assert_eq!(layout.column_count(), 3);
    assert_eq!(layout.primary_key()[0].column_type, ColumnType::Text);
}

#[test]
fn dimension_layout_rejects_empty_name() {
    let err = DimensionLayout::from_schema(&Dim {
        name: "",
        pk: &["pk:VARCHAR"],
        payload: &[],
    })
    .unwrap_err();
    assert!(invalid(err).contains("non-empty"));
}

#[test]
fn dimension_layout_rejects_missing_primary_key() {
    let err = DimensionLayout::from_schema(&Dim {
        name: "things",
        pk: &[],
        payload: &["code:VARCHAR"],
    })
    .unwrap_err();
    assert!(invalid(err).contains("primary key"));
}

#[test]
fn dimension_layout_rejects_malformed_columns() {
    let cases: [&'static [&'static str]; 3] = [&["code"], &["code:BLOB"], &["Code:VARCHAR"]];
    for payload in cases {
        let result = DimensionLayout::from_schema(&Dim {
            name: "things",
            pk: &["pk:VARCHAR"],
            payload,
        });
        assert!(result.is_err(), "payload {payload:?} should be rejected");
    }
}

#[test]
fn dimension_layout_rejects_duplicate_and_reserved_columns() {
    let duplicate = DimensionLayout::from_schema(&Dim {
        name: "things",
        pk: &["pk:VARCHAR"],
        payload: &["pk:VARCHAR"],
    })
    .unwrap_err();
    assert!(invalid(duplicate).contains("duplicate"));
    let reserved = DimensionLayout::from_schema(&Dim {
        name: "things",
        pk: &["pk:VARCHAR"],
        payload: &["is_deleted:INTEGER"],
    })
    .unwrap_err();
    assert!(invalid(reserved).contains("reserved"));
}

// ============================================================================
// SECTION: Fact Layouts
// ============================================================================

#[test]
fn fact_layout_accepts_plain_schema() {
    let layout = FactLayout::from_schema(&fact()).unwrap();
    assert_eq!(layout.table_name(), "fact_events");
    assert_eq!(layout.dedup_mode(), DedupMode::None);
}

#[test]
fn fact_layout_requires_declared_unique_keys() {
    let schema = Fact {
        unique: &["missing"],
        ..fact()
    };
    assert!(invalid(FactLayout::from_schema(&schema).unwrap_err()).contains("unique key"));
}

#[test]
fn fact_layout_replacing_requires_version_column() {
    let schema = Fact {
        unique: &["key"],
        dedup: DedupMode::Replacing,
        ..fact()
    };
    assert!(invalid(FactLayout::from_schema(&schema).unwrap_err()).contains("version column"));
    let ok = Fact {
        unique: &["key"],
        dedup: DedupMode::Replacing,
        version: Some("version"),
        ..fact()
    };
    assert!(FactLayout::from_schema(&ok).is_ok());
}

#[test]
fn fact_layout_partition_requires_time_column() {
    let schema = Fact {
        partition: true,
        ..fact()
    };
    assert!(invalid(FactLayout::from_schema(&schema).unwrap_err()).contains("time column"));
    let ok = Fact {
        partition: true,
        time: Some("event_ts"),
        ..fact()
    };
    assert!(FactLayout::from_schema(&ok).unwrap().partition_by_time());
}
