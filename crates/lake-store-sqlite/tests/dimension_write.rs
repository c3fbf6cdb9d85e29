// crates/lake-store-sqlite/tests/dimension_write.rs
// ============================================================================
// Module: Dimension Write Tests
// Description: Staging, delta, tombstone, and idempotency behavior.
// Purpose: Validate the versioned dimension write pipeline end to end.
// ============================================================================

//! ## Overview
//! Integration tests for [`DimensionDataset::write_batch`]:
//! - New, changed, unchanged, and tombstoned versions
//! - Idempotency per operation id
//! - Producer, shape, and cancellation failures leave history untouched
//! - Staging isolation, cleanup, and TTL purge

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
    reason = "Test-only assertions and helpers are permitted."
)]

use lake_core::CancelToken;
use lake_core::DimensionSchema;
use lake_core::NaturalKey;
use lake_core::OpId;
use lake_core::RowSourceError;
use lake_core::Value;
use lake_core::now_millis;
use lake_store_sqlite::DimensionDataset;
use lake_store_sqlite::DimensionWriteConfig;
use lake_store_sqlite::Warehouse;
use lake_store_sqlite::WarehouseConfig;
use lake_store_sqlite::WarehouseError;
use proptest::prelude::*;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;
use time::OffsetDateTime;
use time::macros::datetime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

struct SinglePk;

impl DimensionSchema for SinglePk {
    fn name(&self) -> &str {
        "test_single_pk"
    }

    fn primary_key_columns(&self) -> &[&str] {
        &["pk:VARCHAR"]
    }

    fn payload_columns(&self) -> &[&str] {
        &["code:VARCHAR", "name:VARCHAR"]
    }
}

struct MultiplePk;

impl DimensionSchema for MultiplePk {
    fn name(&self) -> &str {
        "test_multiple_pk"
    }

    fn primary_key_columns(&self) -> &[&str] {
        &["pk1:VARCHAR", "pk2:VARCHAR"]
    }

    fn payload_columns(&self) -> &[&str] {
        &["code:VARCHAR"]
    }
}

fn open(dir: &TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig::new(dir.path().join("lake.db"))).unwrap()
}

fn raw(dir: &TempDir) -> Connection {
    Connection::open(dir.path().join("lake.db")).unwrap()
}

fn at(ts: OffsetDateTime) -> DimensionWriteConfig {
    DimensionWriteConfig {
        snapshot_ts: Some(ts),
        ..DimensionWriteConfig::default()
    }
}

fn deleting_at(ts: OffsetDateTime) -> DimensionWriteConfig {
    DimensionWriteConfig {
        snapshot_ts: Some(ts),
        missing_means_deleted: true,
        ..DimensionWriteConfig::default()
    }
}

fn rows(entries: &[(&str, &str, &str)]) -> Vec<Vec<Value>> {
    entries
        .iter()
        .map(|(pk, code, name)| vec![Value::from(*pk), Value::from(*code), Value::from(*name)])
        .collect()
}

fn write(
    dataset: &DimensionDataset,
    warehouse: &Warehouse,
    data: &[Vec<Value>],
    config: &DimensionWriteConfig,
) -> Result<lake_store_sqlite::WriteSummary, WarehouseError> {
    dataset.write_batch(warehouse, data.len(), |i| Ok(data[i].clone()), config, &CancelToken::new())
}

fn key(pk: &str) -> lake_core::SurrogateKey {
    NaturalKey::new([pk]).to_surrogate()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0)).unwrap()
}

// ============================================================================
// SECTION: Versioning
// ============================================================================

#[test]
fn insert_new_entity() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let t1 = datetime!(2024-01-01 10:00 UTC);

    let summary =
        write(&dataset, &warehouse, &rows(&[("entity1", "CODE1", "Name1")]), &at(t1)).unwrap();
    assert_eq!(summary.staged, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.history_rows(), 1);
    assert_eq!(summary.snapshot_ts, t1);

    let current = dataset.get_current_row(&warehouse, &key("entity1")).unwrap().unwrap();
    assert_eq!(current.text("code"), Some("CODE1"));
    assert_eq!(current.text("name"), Some("Name1"));
    assert_eq!(current.snapshot_ts, t1);
    assert_eq!(current.op_id, summary.op_id);
    assert!(!current.is_deleted);
    assert_eq!(count(&raw(&dir), dataset.staging_table_name()), 0);
}

#[test]
fn update_existing_entity() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let t1 = datetime!(2024-01-01 10:00 UTC);
    let t2 = datetime!(2024-01-01 11:00 UTC);

    write(&dataset, &warehouse, &rows(&[("entity1", "CODE1", "Name1")]), &at(t1)).unwrap();
    let summary =
        write(&dataset, &warehouse, &rows(&[("entity1", "CODE2", "Name2")]), &at(t2)).unwrap();
    assert_eq!(summary.changed, 1);

    let current = dataset.get_current_row(&warehouse, &key("entity1")).unwrap().unwrap();
    assert_eq!(current.text("code"), Some("CODE2"));
    assert_eq!(dataset.get_history(&warehouse, &key("entity1")).unwrap().len(), 2);
}

#[test]
fn unchanged_payload_appends_nothing() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let data = rows(&[("entity1", "CODE1", "Name1")]);

    write(&dataset, &warehouse, &data, &at(datetime!(2024-01-01 10:00 UTC))).unwrap();
    let summary = write(&dataset, &warehouse, &data, &at(datetime!(2024-01-01 11:00 UTC))).unwrap();
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.history_rows(), 0);

    let history = dataset.get_history(&warehouse, &key("entity1")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].snapshot_ts, datetime!(2024-01-01 10:00 UTC));
}

#[test]
fn same_op_id_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let config = DimensionWriteConfig {
        snapshot_ts: Some(datetime!(2024-01-01 10:00 UTC)),
        op_id: Some(OpId::new_random()),
        missing_means_deleted: true,
        cleanup_staging: None,
    };
    let data = rows(&[("entity1", "CODE1", "Name1"), ("entity2", "CODE2", "Name2")]);

    let first = write(&dataset, &warehouse, &data, &config).unwrap();
    let second = write(&dataset, &warehouse, &data, &config).unwrap();
    assert_eq!(first.history_rows(), 2);
    assert_eq!(second.history_rows(), 0);
    assert_eq!(second.op_id, first.op_id);
    assert_eq!(count(&raw(&dir), dataset.history_table_name()), 2);
}

#[test]
fn multiple_writes_same_snapshot_different_op_ids() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let t1 = datetime!(2024-01-01 10:00 UTC);

    write(&dataset, &warehouse, &rows(&[("entity1", "A", "First")]), &at(t1)).unwrap();
    write(&dataset, &warehouse, &rows(&[("entity1", "B", "Second")]), &at(t1)).unwrap();

    let current = dataset.get_current_row(&warehouse, &key("entity1")).unwrap().unwrap();
    assert_eq!(current.text("code"), Some("B"));
}

#[test]
fn duplicate_entity_in_batch_resolves_to_last_produced() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let data = rows(&[("entity1", "FIRST", "One"), ("entity1", "SECOND", "Two")]);

    let summary = write(&dataset, &warehouse, &data, &at(datetime!(2024-01-01 10:00 UTC))).unwrap();
    assert_eq!(summary.staged, 2);
    assert_eq!(summary.inserted, 1);

    let history = dataset.get_history(&warehouse, &key("entity1")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text("code"), Some("SECOND"));
}

#[test]
fn multiple_pk_columns_derive_key_from_all_parts() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&MultiplePk).unwrap();
    let data = vec![vec![Value::from("a"), Value::from("bc"), Value::from("X")]];

    write(&dataset, &warehouse, &data, &at(datetime!(2024-01-01 10:00 UTC))).unwrap();

    let expected = NaturalKey::new(["a", "bc"]).to_surrogate();
    let current = dataset.get_current_row(&warehouse, &expected).unwrap().unwrap();
    assert_eq!(current.entity_id, expected);
    assert_eq!(current.text("pk1"), Some("a"));
    assert_eq!(current.text("pk2"), Some("bc"));
    let colliding = NaturalKey::new(["ab", "c"]).to_surrogate();
    assert!(dataset.get_current_row(&warehouse, &colliding).unwrap().is_none());
}

#[test]
fn snapshot_timestamp_is_truncated_to_millis() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let precise = datetime!(2024-01-01 10:00:00.123_456_789 UTC);

    let summary =
        write(&dataset, &warehouse, &rows(&[("entity1", "C", "N")]), &at(precise)).unwrap();
    assert_eq!(summary.snapshot_ts, datetime!(2024-01-01 10:00:00.123 UTC));
    let current = dataset.get_current_row(&warehouse, &key("entity1")).unwrap().unwrap();
    assert_eq!(current.snapshot_ts, datetime!(2024-01-01 10:00:00.123 UTC));
}

// ============================================================================
// SECTION: Tombstones
// ============================================================================

#[test]
fn missing_entity_is_tombstoned_with_payload_preserved() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let t1 = datetime!(2024-01-01 10:00 UTC);
    let t2 = datetime!(2024-01-01 11:00 UTC);

    write(
        &dataset,
        &warehouse,
        &rows(&[("entity1", "CODE1", "Name1"), ("entity2", "CODE2", "Name2")]),
        &at(t1),
    )
    .unwrap();
    let summary =
        write(&dataset, &warehouse, &rows(&[("entity1", "CODE1", "Name1")]), &deleting_at(t2))
            .unwrap();
    assert_eq!(summary.tombstoned, 1);
    assert_eq!(summary.unchanged, 1);

    assert!(dataset.get_current_row(&warehouse, &key("entity2")).unwrap().is_none());
    let before = dataset
        .get_as_of_row(&warehouse, &key("entity2"), datetime!(2024-01-01 10:30 UTC))
        .unwrap()
        .unwrap();
    assert_eq!(before.text("code"), Some("CODE2"));

    let history = dataset.get_history(&warehouse, &key("entity2")).unwrap();
    let tombstone = history.last().unwrap();
    assert!(tombstone.is_deleted);
    assert_eq!(tombstone.snapshot_ts, t2);
    assert_eq!(tombstone.text("code"), Some("CODE2"));
    assert_eq!(tombstone.text("name"), Some("Name2"));
}

#[test]
fn empty_snapshot_tombstones_everything_when_missing_means_deleted() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();

    write(
        &dataset,
        &warehouse,
        &rows(&[("entity1", "CODE1", "Name1"), ("entity2", "CODE2", "Name2")]),
        &at(datetime!(2024-01-01 10:00 UTC)),
    )
    .unwrap();
    let summary = write(&dataset, &warehouse, &[], &deleting_at(datetime!(2024-01-01 11:00 UTC)))
        .unwrap();
    assert_eq!(summary.tombstoned, 2);
    assert!(dataset.get_current_rows(&warehouse, None).unwrap().is_empty());

    let again = write(&dataset, &warehouse, &[], &deleting_at(datetime!(2024-01-01 12:00 UTC)))
        .unwrap();
    assert_eq!(again.history_rows(), 0);
}

#[test]
fn empty_snapshot_without_missing_means_deleted_is_noop() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();

    write(&dataset, &warehouse, &rows(&[("entity1", "C", "N")]), &at(datetime!(2024-01-01 10:00 UTC)))
        .unwrap();
    let summary =
        write(&dataset, &warehouse, &[], &at(datetime!(2024-01-01 11:00 UTC))).unwrap();
    assert_eq!(summary.staged, 0);
    assert_eq!(summary.history_rows(), 0);
    assert!(dataset.get_current_row(&warehouse, &key("entity1")).unwrap().is_some());
}

#[test]
fn writing_other_entity_does_not_delete_without_missing_means_deleted() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();

    write(&dataset, &warehouse, &rows(&[("entity1", "C1", "N1")]), &at(datetime!(2024-01-01 10:00 UTC)))
        .unwrap();
    write(&dataset, &warehouse, &rows(&[("entity2", "C2", "N2")]), &at(datetime!(2024-01-01 11:00 UTC)))
        .unwrap();

    let current = dataset.get_current_rows(&warehouse, None).unwrap();
    assert_eq!(current.len(), 2);
}

#[test]
fn delete_then_recreate_keeps_lineage() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let e1 = key("entity1");

    write(&dataset, &warehouse, &rows(&[("entity1", "A", "Name")]), &at(datetime!(2024-01-01 01:00 UTC)))
        .unwrap();
    write(&dataset, &warehouse, &[], &deleting_at(datetime!(2024-01-01 02:00 UTC))).unwrap();
    assert!(dataset.get_current_row(&warehouse, &e1).unwrap().is_none());

    let summary = write(
        &dataset,
        &warehouse,
        &rows(&[("entity1", "B", "Name")]),
        &at(datetime!(2024-01-01 03:00 UTC)),
    )
    .unwrap();
    assert_eq!(summary.inserted, 1);

    let current = dataset.get_current_row(&warehouse, &e1).unwrap().unwrap();
    assert_eq!(current.text("code"), Some("B"));
    let first = dataset.get_as_of_row(&warehouse, &e1, datetime!(2024-01-01 01:30 UTC)).unwrap();
    assert_eq!(first.unwrap().text("code"), Some("A"));
    let deleted = dataset.get_as_of_row(&warehouse, &e1, datetime!(2024-01-01 02:30 UTC)).unwrap();
    assert!(deleted.is_none());
    assert_eq!(dataset.get_history(&warehouse, &e1).unwrap().len(), 3);
}

#[test]
fn recreating_with_identical_payload_still_appends() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let data = rows(&[("entity1", "A", "Name")]);

    write(&dataset, &warehouse, &data, &at(datetime!(2024-01-01 01:00 UTC))).unwrap();
    write(&dataset, &warehouse, &[], &deleting_at(datetime!(2024-01-01 02:00 UTC))).unwrap();
    let summary = write(&dataset, &warehouse, &data, &at(datetime!(2024-01-01 03:00 UTC))).unwrap();
    assert_eq!(summary.inserted, 1);
    assert!(dataset.get_current_row(&warehouse, &key("entity1")).unwrap().is_some());
}

// ============================================================================
// SECTION: Failures
// ============================================================================

#[test]
fn row_producer_error_leaves_history_untouched() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();

    let err = dataset
        .write_batch(
            &warehouse,
            1,
            |_| Err(RowSourceError::new("boom")),
            &DimensionWriteConfig::default(),
            &CancelToken::new(),
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "failed to get row data 0: boom");
    assert_eq!(count(&raw(&dir), dataset.history_table_name()), 0);
}

#[test]
fn wrong_column_count_is_rejected() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();

    let too_few = vec![vec![Value::from("entity1"), Value::from("CODE1")]];
    let err = write(&dataset, &warehouse, &too_few, &DimensionWriteConfig::default()).unwrap_err();
    assert_eq!(err.to_string(), "row 0 has 2 columns, expected exactly 3");

    let mut too_many = rows(&[("entity1", "CODE1", "Name1")]);
    too_many[0].push(Value::from("extra"));
    let err = write(&dataset, &warehouse, &too_many, &DimensionWriteConfig::default()).unwrap_err();
    assert_eq!(
        err,
        WarehouseError::RowShape {
            index: 0,
            actual: 4,
            expected: 3,
        }
    );
    assert_eq!(count(&raw(&dir), dataset.history_table_name()), 0);
}

#[test]
fn type_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();

    let data = vec![vec![Value::from("entity1"), Value::Int(7), Value::from("Name")]];
    let err = write(&dataset, &warehouse, &data, &DimensionWriteConfig::default()).unwrap_err();
    assert_eq!(err.to_string(), "column code expects TEXT, got int");
}

#[test]
fn cancellation_mid_write_leaves_history_untouched() {
    let dir = TempDir::new().unwrap();
    let mut config = WarehouseConfig::new(dir.path().join("lake.db"));
    config.staging_batch_size = 2;
    let warehouse = Warehouse::open(config).unwrap();
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let cancel = CancelToken::new();

    let err = dataset
        .write_batch(
            &warehouse,
            10,
            |i| {
                if i == 5 {
                    cancel.cancel();
                }
                Ok(vec![format!("entity{i}").into(), "C".into(), "N".into()])
            },
            &DimensionWriteConfig::default(),
            &cancel,
        )
        .unwrap_err();
    assert_eq!(err, WarehouseError::Cancelled);
    assert_eq!(err.to_string(), "write cancelled during batch insert");
    let conn = raw(&dir);
    assert_eq!(count(&conn, dataset.history_table_name()), 0);
    assert_eq!(count(&conn, dataset.staging_table_name()), 0);
}

#[test]
fn history_rejects_updates_and_deletes() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    write(&dataset, &warehouse, &rows(&[("entity1", "C", "N")]), &DimensionWriteConfig::default())
        .unwrap();

    let conn = raw(&dir);
    let table = dataset.history_table_name();
    let update = conn.execute(&format!("UPDATE {table} SET code = 'X'"), []);
    assert!(update.unwrap_err().to_string().contains("append-only"));
    let delete = conn.execute(&format!("DELETE FROM {table}"), []);
    assert!(delete.unwrap_err().to_string().contains("append-only"));
}

// ============================================================================
// SECTION: Out-of-Order Snapshots
// ============================================================================

fn code_as_of(
    dataset: &DimensionDataset,
    warehouse: &Warehouse,
    pk: &str,
    ts: OffsetDateTime,
) -> Option<String> {
    dataset
        .get_as_of_row(warehouse, &key(pk), ts)
        .unwrap()
        .and_then(|row| row.text("code").map(str::to_string))
}

#[test]
fn late_snapshot_compares_against_version_in_effect_at_its_time() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let t1 = datetime!(2024-01-01 01:00 UTC);
    let t2 = datetime!(2024-01-01 02:00 UTC);
    let t3 = datetime!(2024-01-01 03:00 UTC);

    write(&dataset, &warehouse, &rows(&[("entity1", "A", "N")]), &at(t1)).unwrap();
    write(&dataset, &warehouse, &rows(&[("entity1", "B", "N")]), &at(t3)).unwrap();
    let late = write(&dataset, &warehouse, &rows(&[("entity1", "B", "N")]), &at(t2)).unwrap();
    assert_eq!(late.changed, 1);
    assert_eq!(late.unchanged, 0);

    assert_eq!(
        code_as_of(&dataset, &warehouse, "entity1", datetime!(2024-01-01 01:30 UTC)),
        Some("A".to_string())
    );
    assert_eq!(
        code_as_of(&dataset, &warehouse, "entity1", datetime!(2024-01-01 02:30 UTC)),
        Some("B".to_string())
    );
    let current = dataset.get_current_row(&warehouse, &key("entity1")).unwrap().unwrap();
    assert_eq!(current.snapshot_ts, t3);
    assert_eq!(dataset.get_history(&warehouse, &key("entity1")).unwrap().len(), 3);
}

#[test]
fn late_deleting_snapshot_only_considers_entities_live_at_its_time() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let t1 = datetime!(2024-01-01 01:00 UTC);
    let t2 = datetime!(2024-01-01 02:00 UTC);
    let t3 = datetime!(2024-01-01 03:00 UTC);

    write(&dataset, &warehouse, &rows(&[("entity1", "A", "N")]), &at(t1)).unwrap();
    write(&dataset, &warehouse, &rows(&[("entity2", "X", "N"), ("entity3", "Y", "N")]), &at(t3))
        .unwrap();
    let late =
        write(&dataset, &warehouse, &rows(&[("entity2", "X", "N")]), &deleting_at(t2)).unwrap();
    assert_eq!(late.inserted, 1);
    assert_eq!(late.tombstoned, 1);

    let mid = datetime!(2024-01-01 02:30 UTC);
    assert_eq!(code_as_of(&dataset, &warehouse, "entity2", mid), Some("X".to_string()));
    assert_eq!(code_as_of(&dataset, &warehouse, "entity1", mid), None);
    assert_eq!(code_as_of(&dataset, &warehouse, "entity3", mid), None);
    assert_eq!(
        code_as_of(&dataset, &warehouse, "entity1", datetime!(2024-01-01 01:30 UTC)),
        Some("A".to_string())
    );

    let entity3 = dataset.get_history(&warehouse, &key("entity3")).unwrap();
    assert_eq!(entity3.len(), 1);
    assert!(!entity3[0].is_deleted);
    assert!(dataset.get_current_row(&warehouse, &key("entity3")).unwrap().is_some());
}

#[test]
fn staged_rows_of_one_op_resolve_to_highest_tuple_in_either_order() {
    let t_early = datetime!(2024-01-01 01:00 UTC);
    let t_late = datetime!(2024-01-01 03:00 UTC);
    for late_first in [true, false] {
        let dir = TempDir::new().unwrap();
        let warehouse = open(&dir);
        let dataset = DimensionDataset::new(&SinglePk).unwrap();
        let op_id = OpId::new_random();
        let config = |ts: OffsetDateTime| DimensionWriteConfig {
            snapshot_ts: Some(ts),
            op_id: Some(op_id),
            missing_means_deleted: false,
            cleanup_staging: Some(false),
        };
        let early = rows(&[("entity1", "EARLY", "N")]);
        let late = rows(&[("entity1", "LATE", "N")]);

        let second = if late_first {
            write(&dataset, &warehouse, &late, &config(t_late)).unwrap();
            write(&dataset, &warehouse, &early, &config(t_early)).unwrap()
        } else {
            write(&dataset, &warehouse, &early, &config(t_early)).unwrap();
            write(&dataset, &warehouse, &late, &config(t_late)).unwrap()
        };
        assert_eq!(second.staged, 1);

        let history = dataset.get_history(&warehouse, &key("entity1")).unwrap();
        let codes: Vec<Option<&str>> = history.iter().map(|row| row.text("code")).collect();
        if late_first {
            assert_eq!(second.unchanged, 1);
            assert_eq!(second.history_rows(), 0);
            assert_eq!(codes, vec![Some("LATE")]);
        } else {
            assert_eq!(second.changed, 1);
            assert_eq!(codes, vec![Some("EARLY"), Some("LATE")]);
        }
        let current = dataset.get_current_row(&warehouse, &key("entity1")).unwrap().unwrap();
        assert_eq!(current.text("code"), Some("LATE"));
        assert_eq!(current.snapshot_ts, t_late);
    }
}

// ============================================================================
// SECTION: Staging
// ============================================================================

#[test]
fn old_staging_rows_from_other_ops_do_not_interfere() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    dataset.ensure_tables(&warehouse).unwrap();
    let t1 = datetime!(2024-01-01 10:00 UTC);

    let conn = raw(&dir);
    conn.execute(
        &format!(
            "INSERT INTO {} (entity_id, snapshot_ts, ingested_at, op_id, is_deleted, attrs_hash, \
             pk, code, name) VALUES (?1, ?2, ?3, ?4, 0, 0, ?5, ?6, ?7)",
            dataset.staging_table_name()
        ),
        params![
            key("entity1").as_str(),
            t1.unix_timestamp() * 1_000,
            now_millis(),
            OpId::new_random().to_string(),
            "entity1",
            "OLD_CODE",
            "OldName"
        ],
    )
    .unwrap();

    write(&dataset, &warehouse, &rows(&[("entity1", "NEW_CODE", "NewName")]), &at(t1)).unwrap();
    let current = dataset.get_current_row(&warehouse, &key("entity1")).unwrap().unwrap();
    assert_eq!(current.text("code"), Some("NEW_CODE"));
    assert_eq!(count(&conn, dataset.staging_table_name()), 1);
}

#[test]
fn expired_staging_rows_are_purged_on_write() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    dataset.ensure_tables(&warehouse).unwrap();

    let conn = raw(&dir);
    let eight_days_ago = now_millis() - 8 * 24 * 60 * 60 * 1_000;
    conn.execute(
        &format!(
            "INSERT INTO {} (entity_id, snapshot_ts, ingested_at, op_id, is_deleted, attrs_hash, \
             pk, code, name) VALUES ('stale', 0, ?1, ?2, 0, 0, 'stale', 'C', 'N')",
            dataset.staging_table_name()
        ),
        params![eight_days_ago, OpId::new_random().to_string()],
    )
    .unwrap();

    write(&dataset, &warehouse, &rows(&[("entity1", "C", "N")]), &DimensionWriteConfig::default())
        .unwrap();
    assert_eq!(count(&conn, dataset.staging_table_name()), 0);
}

#[test]
fn staging_is_kept_when_cleanup_disabled() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    let config = DimensionWriteConfig {
        cleanup_staging: Some(false),
        ..DimensionWriteConfig::default()
    };

    let summary =
        write(&dataset, &warehouse, &rows(&[("entity1", "C", "N"), ("entity2", "C", "N")]), &config)
            .unwrap();
    let conn = raw(&dir);
    let staged: i64 = conn
        .query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE op_id = ?1 AND attrs_hash = 0",
                dataset.staging_table_name()
            ),
            params![summary.op_id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(staged, 2);
}

#[test]
fn recovery_after_foreign_history_row() {
    let dir = TempDir::new().unwrap();
    let warehouse = open(&dir);
    let dataset = DimensionDataset::new(&SinglePk).unwrap();
    dataset.ensure_tables(&warehouse).unwrap();
    let t1 = datetime!(2024-01-01 10:00 UTC);

    raw(&dir)
        .execute(
            &format!(
                "INSERT INTO {} (entity_id, snapshot_ts, ingested_at, op_id, is_deleted, \
                 attrs_hash, pk, code, name) VALUES (?1, ?2, ?3, ?4, 0, 0, 'entity4', 'CODE4', \
                 'Name4')",
                dataset.history_table_name()
            ),
            params![
                key("entity4").as_str(),
                t1.unix_timestamp() * 1_000,
                now_millis() - 1_000,
                OpId::new_random().to_string()
            ],
        )
        .unwrap();

    write(&dataset, &warehouse, &rows(&[("entity4", "CODE4", "Name4")]), &at(t1)).unwrap();
    let current = dataset.get_current_row(&warehouse, &key("entity4")).unwrap().unwrap();
    assert_eq!(current.text("code"), Some("CODE4"));
    assert_eq!(current.text("name"), Some("Name4"));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn replaying_a_snapshot_appends_nothing(
        entries in proptest::collection::btree_map("[a-z]{1,6}", "[A-Z]{0,4}", 0 .. 12)
    ) {
        let dir = TempDir::new().unwrap();
        let warehouse = open(&dir);
        let dataset = DimensionDataset::new(&SinglePk).unwrap();
        let data: Vec<Vec<Value>> = entries
            .iter()
            .map(|(pk, code)| vec![pk.clone().into(), code.clone().into(), Value::Null])
            .collect();

        let first = write(&dataset, &warehouse, &data, &deleting_at(datetime!(2024-01-01 10:00 UTC)))
            .unwrap();
        let second = write(&dataset, &warehouse, &data, &deleting_at(datetime!(2024-01-01 11:00 UTC)))
            .unwrap();
        prop_assert_eq!(first.inserted, entries.len());
        prop_assert_eq!(second.history_rows(), 0);
        prop_assert_eq!(dataset.get_current_rows(&warehouse, None).unwrap().len(), entries.len());
    }
}
