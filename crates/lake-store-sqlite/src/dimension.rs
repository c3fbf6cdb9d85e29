// crates/lake-store-sqlite/src/dimension.rs
// ============================================================================
// Module: Versioned Dimension Engine
// Description: Staging -> delta -> history writes and point-in-time reads.
// Purpose: Persist entity snapshots as an append-only, versioned history.
// Dependencies: lake-core, rusqlite, serde, time, tracing
// ============================================================================

//! ## Overview
//! A [`DimensionDataset`] owns two relations: `stg_dim_<name>_snapshot`
//! lands an incoming snapshot, and `dim_<name>_history` holds immutable
//! versions. [`DimensionDataset::write_batch`] stages rows in committed
//! sub-batches, aggregates them per entity, compares content hashes with the
//! history version in effect at the snapshot time, and appends only new,
//! changed, or tombstoned versions in a single transaction.
//!
//! Version order is `(snapshot_ts, ingested_at, op_id)` descending with
//! `rowid` as the final tie-breaker, so exact duplicates resolve to the row
//! produced last. Current state is ranked at query time; there is no
//! mutable "current" table.
//!
//! Invariants:
//! - History rows are never updated or deleted (enforced by triggers).
//! - Writes are idempotent per `op_id`: replaying a snapshot appends nothing.
//! - No history row is written when staging fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use lake_core::CancelToken;
use lake_core::ColumnSpec;
use lake_core::DimensionLayout;
use lake_core::DimensionSchema;
use lake_core::OpId;
use lake_core::RowResult;
use lake_core::SurrogateKey;
use lake_core::Value;
use lake_core::attrs_hash;
use lake_core::from_unix_millis;
use lake_core::surrogate_key;
use lake_core::to_unix_millis;
use lake_core::truncate_to_millis;
use rusqlite::Connection;
use rusqlite::Params;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::codec::coerce_row;
use crate::codec::decode_value;
use crate::codec::to_sql_value;
use crate::warehouse::DatasetKind;
use crate::warehouse::Warehouse;
use crate::warehouse::WarehouseError;
use crate::warehouse::db_error;
use crate::warehouse::quote_ident;
use crate::warehouse::register_dataset;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Metadata columns preceding user columns in every projection.
const METADATA_COLUMNS: usize = 6;
/// Maximum entity ids bound into one `IN (...)` clause.
const ID_CHUNK_SIZE: usize = 500;
/// Window ordering that defines the latest version of an entity.
const VERSION_ORDER: &str = "snapshot_ts DESC, ingested_at DESC, op_id DESC, rowid DESC";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Options for a single dimension write.
#[derive(Debug, Clone, Default)]
pub struct DimensionWriteConfig {
    /// Snapshot time; defaults to now. Truncated to milliseconds.
    pub snapshot_ts: Option<OffsetDateTime>,
    /// Operation id; defaults to a fresh v4 id.
    pub op_id: Option<OpId>,
    /// Tombstone live entities absent from the snapshot.
    pub missing_means_deleted: bool,
    /// Delete this operation's staging rows afterwards (default true).
    pub cleanup_staging: Option<bool>,
}

/// Outcome of a dimension write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Operation id used for the write.
    pub op_id: OpId,
    /// Effective snapshot time.
    #[serde(with = "time::serde::rfc3339")]
    pub snapshot_ts: OffsetDateTime,
    /// Rows landed in staging.
    pub staged: usize,
    /// Versions appended for entities without a live version.
    pub inserted: usize,
    /// Versions appended because the payload changed.
    pub changed: usize,
    /// Tombstones appended.
    pub tombstoned: usize,
    /// Staged entities whose payload matched the latest version.
    pub unchanged: usize,
}

impl WriteSummary {
    /// Builds an empty summary.
    const fn empty(op_id: OpId, snapshot_ts: OffsetDateTime) -> Self {
        Self {
            op_id,
            snapshot_ts,
            staged: 0,
            inserted: 0,
            changed: 0,
            tombstoned: 0,
            unchanged: 0,
        }
    }

    /// Returns the number of history rows appended.
    #[must_use]
    pub const fn history_rows(&self) -> usize {
        self.inserted + self.changed + self.tombstoned
    }
}

/// One stored dimension version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionRow {
    /// Surrogate entity key.
    pub entity_id: SurrogateKey,
    /// Snapshot time of the version.
    #[serde(with = "time::serde::rfc3339")]
    pub snapshot_ts: OffsetDateTime,
    /// Time the version was written.
    #[serde(with = "time::serde::rfc3339")]
    pub ingested_at: OffsetDateTime,
    /// Operation that wrote the version.
    pub op_id: OpId,
    /// Tombstone flag.
    pub is_deleted: bool,
    /// Payload content hash.
    pub attrs_hash: i64,
    /// Primary-key and payload columns by name.
    pub columns: BTreeMap<String, Value>,
}

impl DimensionRow {
    /// Returns a column value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Returns a text column value.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }
}

/// Version queued for append.
struct PendingVersion {
    /// Surrogate entity key.
    entity_id: SurrogateKey,
    /// Snapshot time of the version in unix milliseconds.
    snapshot_ms: i64,
    /// Tombstone flag.
    is_deleted: bool,
    /// Payload content hash.
    attrs_hash: i64,
    /// Primary-key and payload values in layout order.
    values: Vec<Value>,
}

/// Per-write constants shared by staging and history inserts.
struct WriteStamp {
    /// Operation id text.
    op_id: String,
    /// Snapshot time in unix milliseconds.
    snapshot_ms: i64,
    /// Ingest time in unix milliseconds.
    ingested_ms: i64,
}

// ============================================================================
// SECTION: Dataset
// ============================================================================

/// Versioned (SCD2) dimension dataset.
///
/// # Invariants
/// - The layout is validated at construction and immutable afterwards.
#[derive(Debug, Clone)]
pub struct DimensionDataset {
    /// Validated layout.
    layout: Arc<DimensionLayout>,
    /// History relation name.
    history_table: String,
    /// Staging relation name.
    staging_table: String,
}

impl DimensionDataset {
    /// Builds a dataset from a schema.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Schema`] when the schema is invalid.
    pub fn new(schema: &dyn DimensionSchema) -> Result<Self, WarehouseError> {
        let layout = DimensionLayout::from_schema(schema)?;
        Ok(Self {
            history_table: layout.history_table_name(),
            staging_table: layout.staging_table_name(),
            layout: Arc::new(layout),
        })
    }

    /// Returns the validated layout.
    #[must_use]
    pub fn layout(&self) -> &DimensionLayout {
        &self.layout
    }

    /// Returns the dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.layout.name()
    }

    /// Returns the staging relation name.
    #[must_use]
    pub fn staging_table_name(&self) -> &str {
        &self.staging_table
    }

    /// Returns the history relation name.
    #[must_use]
    pub fn history_table_name(&self) -> &str {
        &self.history_table
    }

    /// Creates relations, indexes, and triggers, and records the layout.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when DDL fails or the recorded layout
    /// differs from this one.
    pub fn ensure_tables(&self, warehouse: &Warehouse) -> Result<(), WarehouseError> {
        warehouse.ensure_once(&self.history_table, |connection| {
            let tx = connection.transaction().map_err(db_error)?;
            register_dataset(&tx, DatasetKind::Dimension, self.name(), &self.layout.signature())?;
            let columns = self.column_definitions();
            let staging = &self.staging_table;
            let history = &self.history_table;
            tx.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {staging} ({columns});
                CREATE INDEX IF NOT EXISTS idx_{staging}_op ON {staging} (op_id, ingested_at, \
                 entity_id);
                CREATE INDEX IF NOT EXISTS idx_{staging}_ingested ON {staging} (ingested_at);
                CREATE TABLE IF NOT EXISTS {history} ({columns});
                CREATE UNIQUE INDEX IF NOT EXISTS idx_{history}_version
                    ON {history} (entity_id, snapshot_ts, ingested_at, op_id);
                CREATE TRIGGER IF NOT EXISTS trg_{history}_no_update
                BEFORE UPDATE ON {history}
                BEGIN
                  SELECT RAISE(FAIL, '{history} is append-only');
                END;
                CREATE TRIGGER IF NOT EXISTS trg_{history}_no_delete
                BEFORE DELETE ON {history}
                BEGIN
                  SELECT RAISE(FAIL, '{history} is append-only');
                END;"
            ))
            .map_err(db_error)?;
            tx.commit().map_err(db_error)
        })
    }

    /// Writes one snapshot through staging into history.
    ///
    /// `row_fn(i)` must return primary-key values followed by payload values
    /// in declared order.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::RowShape`], [`WarehouseError::RowSource`],
    /// [`WarehouseError::Schema`], or [`WarehouseError::Cancelled`] when
    /// staging fails (no history row is written), and
    /// [`WarehouseError::Db`] when the history append fails (nothing is
    /// appended).
    pub fn write_batch<F>(
        &self,
        warehouse: &Warehouse,
        count: usize,
        mut row_fn: F,
        config: &DimensionWriteConfig,
        cancel: &CancelToken,
    ) -> Result<WriteSummary, WarehouseError>
    where
        F: FnMut(usize) -> RowResult,
    {
        let op_id = config.op_id.unwrap_or_else(OpId::new_random);
        let snapshot_ts =
            truncate_to_millis(config.snapshot_ts.unwrap_or_else(OffsetDateTime::now_utc));
        let mut summary = WriteSummary::empty(op_id, snapshot_ts);
        if count == 0 && !config.missing_means_deleted {
            debug!(dataset = self.name(), op_id = %op_id, "empty snapshot; nothing to write");
            return Ok(summary);
        }
        self.ensure_tables(warehouse)?;
        let ingested_ms = warehouse.next_ingest_millis();
        self.purge_expired_staging(warehouse, ingested_ms)?;
        let stamp = WriteStamp {
            op_id: op_id.to_string(),
            snapshot_ms: to_unix_millis(snapshot_ts),
            ingested_ms,
        };
        let outcome = self
            .load_staging(warehouse, count, &mut row_fn, &stamp, cancel)
            .and_then(|staged| {
                summary.staged = staged;
                self.append_delta(warehouse, &stamp, config.missing_means_deleted, &mut summary)
            });
        if config.cleanup_staging.unwrap_or(true) {
            match (self.cleanup_staging(warehouse, &op_id), &outcome) {
                (Err(err), Ok(())) => return Err(err),
                (Err(err), Err(_)) => {
                    warn!(
                        dataset = self.name(),
                        op_id = %op_id,
                        error = %err,
                        "staging cleanup failed"
                    );
                }
                (Ok(_), _) => {}
            }
        }
        outcome?;
        info!(
            dataset = self.name(),
            op_id = %op_id,
            staged = summary.staged,
            inserted = summary.inserted,
            changed = summary.changed,
            tombstoned = summary.tombstoned,
            unchanged = summary.unchanged,
            "dimension snapshot written"
        );
        Ok(summary)
    }

    /// Returns the latest non-deleted version of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the query fails.
    pub fn get_current_row(
        &self,
        warehouse: &Warehouse,
        entity_id: &SurrogateKey,
    ) -> Result<Option<DimensionRow>, WarehouseError> {
        self.ensure_tables(warehouse)?;
        let sql = self.latest_sql(&self.history_table, "entity_id = ?1", "");
        let rows = warehouse
            .with_read(|connection| {
                self.query_rows(connection, &sql, params![entity_id.as_str()])
            })?;
        Ok(rows.into_iter().next().filter(|row| !row.is_deleted))
    }

    /// Returns the version of an entity effective at `as_of`.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the query fails.
    pub fn get_as_of_row(
        &self,
        warehouse: &Warehouse,
        entity_id: &SurrogateKey,
        as_of: OffsetDateTime,
    ) -> Result<Option<DimensionRow>, WarehouseError> {
        self.ensure_tables(warehouse)?;
        let sql = self.latest_sql(&self.history_table, "entity_id = ?1 AND snapshot_ts <= ?2", "");
        let as_of_ms = to_unix_millis(as_of);
        let rows = warehouse.with_read(|connection| {
            self.query_rows(connection, &sql, params![entity_id.as_str(), as_of_ms])
        })?;
        Ok(rows.into_iter().next().filter(|row| !row.is_deleted))
    }

    /// Returns current versions for the given entities, or all live
    /// entities when `entity_ids` is `None`, sorted by entity id.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when a query fails.
    pub fn get_current_rows(
        &self,
        warehouse: &Warehouse,
        entity_ids: Option<&[SurrogateKey]>,
    ) -> Result<Vec<DimensionRow>, WarehouseError> {
        self.ensure_tables(warehouse)?;
        let Some(entity_ids) = entity_ids else {
            let sql = self.latest_sql(&self.history_table, "1 = 1", "AND is_deleted = 0");
            return warehouse.with_read(|connection| self.query_rows(connection, &sql, []));
        };
        let unique: BTreeSet<&str> = entity_ids.iter().map(SurrogateKey::as_str).collect();
        let unique: Vec<&str> = unique.into_iter().collect();
        let mut rows = Vec::with_capacity(unique.len());
        warehouse.with_read(|connection| {
            for chunk in unique.chunks(ID_CHUNK_SIZE) {
                let sql = self.latest_sql(
                    &self.history_table,
                    &format!("entity_id IN ({})", placeholders(chunk.len())),
                    "AND is_deleted = 0",
                );
                rows.extend(self.query_rows(connection, &sql, params_from_iter(chunk.iter()))?);
            }
            Ok(())
        })?;
        rows.sort_by(|left, right| left.entity_id.cmp(&right.entity_id));
        Ok(rows)
    }

    /// Returns every version of an entity in version order, tombstones
    /// included.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the query fails.
    pub fn get_history(
        &self,
        warehouse: &Warehouse,
        entity_id: &SurrogateKey,
    ) -> Result<Vec<DimensionRow>, WarehouseError> {
        self.ensure_tables(warehouse)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE entity_id = ?1 ORDER BY snapshot_ts, ingested_at, op_id, \
             rowid",
            self.projection(),
            self.history_table
        );
        warehouse
            .with_read(|connection| self.query_rows(connection, &sql, params![entity_id.as_str()]))
    }

    /// Deletes staging rows ingested before `now_ms` minus the staging TTL.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the delete fails.
    pub fn purge_expired_staging(
        &self,
        warehouse: &Warehouse,
        now_ms: i64,
    ) -> Result<usize, WarehouseError> {
        self.ensure_tables(warehouse)?;
        let cutoff = now_ms.saturating_sub(warehouse.config().staging_ttl_millis());
        let sql = format!("DELETE FROM {} WHERE ingested_at < ?1", self.staging_table);
        let purged = warehouse
            .with_write(|connection| connection.execute(&sql, params![cutoff]).map_err(db_error))?;
        if purged > 0 {
            debug!(dataset = self.name(), purged, "purged expired staging rows");
        }
        Ok(purged)
    }

    // ------------------------------------------------------------------------
    // Write pipeline
    // ------------------------------------------------------------------------

    /// Lands producer rows in staging, one committed transaction per
    /// sub-batch.
    fn load_staging<F>(
        &self,
        warehouse: &Warehouse,
        count: usize,
        row_fn: &mut F,
        stamp: &WriteStamp,
        cancel: &CancelToken,
    ) -> Result<usize, WarehouseError>
    where
        F: FnMut(usize) -> RowResult,
    {
        let batch_size = warehouse.config().staging_batch_size;
        let columns: Vec<&ColumnSpec> = self.layout.columns().collect();
        let key_columns = self.layout.primary_key().len();
        let sql = self.insert_sql(&self.staging_table);
        let mut start = 0;
        while start < count {
            let end = count.min(start.saturating_add(batch_size));
            warehouse.with_write(|connection| {
                let tx = connection.transaction().map_err(db_error)?;
                {
                    let mut stmt = tx.prepare_cached(&sql).map_err(db_error)?;
                    for index in start .. end {
                        if cancel.is_cancelled() {
                            return Err(WarehouseError::Cancelled);
                        }
                        let values = row_fn(index).map_err(|err| WarehouseError::RowSource {
                            index,
                            message: err.to_string(),
                        })?;
                        let values = coerce_row(&columns, key_columns, index, values)?;
                        let entity_id = surrogate_key(&values[.. key_columns]);
                        let params =
                            insert_params(&entity_id, stamp.snapshot_ms, stamp, false, 0, &values);
                        stmt.execute(params_from_iter(params.iter())).map_err(db_error)?;
                    }
                }
                tx.commit().map_err(db_error)
            })?;
            debug!(
                dataset = self.name(),
                op_id = %stamp.op_id,
                rows = end - start,
                "staged sub-batch"
            );
            start = end;
        }
        Ok(count)
    }

    /// Computes the delta against history and appends it atomically.
    ///
    /// Staged rows for the operation collapse to the highest version tuple
    /// per entity. Each survivor is compared with the history version in
    /// effect at its own snapshot time, so late snapshots slot in behind
    /// newer versions instead of being compared against them.
    fn append_delta(
        &self,
        warehouse: &Warehouse,
        stamp: &WriteStamp,
        missing_means_deleted: bool,
        summary: &mut WriteSummary,
    ) -> Result<(), WarehouseError> {
        warehouse.with_write(|connection| {
            let tx = connection.transaction().map_err(db_error)?;
            let staged_sql = self.latest_sql(&self.staging_table, "op_id = ?1", "");
            let staged = self.query_rows(&tx, &staged_sql, params![stamp.op_id])?;
            let previous = self.previous_versions(&tx, &staged)?;
            let mut pending = Vec::new();
            for row in &staged {
                let hash = attrs_hash(&self.payload_values(row), false);
                match previous.get(row.entity_id.as_str()) {
                    None => summary.inserted += 1,
                    Some(prior) if prior.is_deleted => summary.inserted += 1,
                    Some(prior) if prior.attrs_hash != hash => summary.changed += 1,
                    Some(_) => {
                        summary.unchanged += 1;
                        continue;
                    }
                }
                pending.push(PendingVersion {
                    entity_id: row.entity_id.clone(),
                    snapshot_ms: to_unix_millis(row.snapshot_ts),
                    is_deleted: false,
                    attrs_hash: hash,
                    values: self.ordered_values(row),
                });
            }
            if missing_means_deleted {
                let present: BTreeSet<&str> =
                    staged.iter().map(|row| row.entity_id.as_str()).collect();
                for live in self.live_versions(&tx, stamp.snapshot_ms)? {
                    if present.contains(live.entity_id.as_str()) {
                        continue;
                    }
                    summary.tombstoned += 1;
                    pending.push(PendingVersion {
                        entity_id: live.entity_id.clone(),
                        snapshot_ms: stamp.snapshot_ms,
                        is_deleted: true,
                        attrs_hash: attrs_hash(&self.payload_values(&live), true),
                        values: self.ordered_values(&live),
                    });
                }
            }
            {
                let mut stmt =
                    tx.prepare_cached(&self.insert_sql(&self.history_table)).map_err(db_error)?;
                for version in &pending {
                    let params = insert_params(
                        &version.entity_id,
                        version.snapshot_ms,
                        stamp,
                        version.is_deleted,
                        version.attrs_hash,
                        &version.values,
                    );
                    stmt.execute(params_from_iter(params.iter())).map_err(db_error)?;
                }
            }
            tx.commit().map_err(db_error)
        })
    }

    /// Loads, per staged entity, the history version in effect at the staged
    /// row's snapshot time.
    fn previous_versions(
        &self,
        connection: &Connection,
        staged: &[DimensionRow],
    ) -> Result<BTreeMap<String, DimensionRow>, WarehouseError> {
        let mut by_snapshot: BTreeMap<i64, Vec<&str>> = BTreeMap::new();
        for row in staged {
            by_snapshot
                .entry(to_unix_millis(row.snapshot_ts))
                .or_default()
                .push(row.entity_id.as_str());
        }
        let mut rows = Vec::new();
        for (snapshot_ms, ids) in &by_snapshot {
            for chunk in ids.chunks(ID_CHUNK_SIZE) {
                let filter = format!(
                    "entity_id IN ({}) AND snapshot_ts <= ?{}",
                    placeholders(chunk.len()),
                    chunk.len() + 1
                );
                let sql = self.latest_sql(&self.history_table, &filter, "");
                let mut bound: Vec<SqlValue> =
                    chunk.iter().map(|id| SqlValue::Text((*id).to_string())).collect();
                bound.push(SqlValue::Integer(*snapshot_ms));
                rows.extend(self.query_rows(connection, &sql, params_from_iter(bound.iter()))?);
            }
        }
        Ok(rows.into_iter().map(|row| (row.entity_id.as_str().to_string(), row)).collect())
    }

    /// Loads every entity whose version in effect at `snapshot_ms` is live.
    fn live_versions(
        &self,
        connection: &Connection,
        snapshot_ms: i64,
    ) -> Result<Vec<DimensionRow>, WarehouseError> {
        let sql = self.latest_sql(&self.history_table, "snapshot_ts <= ?1", "AND is_deleted = 0");
        self.query_rows(connection, &sql, params![snapshot_ms])
    }

    /// Deletes this operation's staging rows.
    fn cleanup_staging(
        &self,
        warehouse: &Warehouse,
        op_id: &OpId,
    ) -> Result<usize, WarehouseError> {
        let sql = format!("DELETE FROM {} WHERE op_id = ?1", self.staging_table);
        warehouse.with_write(|connection| {
            connection.execute(&sql, params![op_id.to_string()]).map_err(db_error)
        })
    }

    // ------------------------------------------------------------------------
    // SQL helpers
    // ------------------------------------------------------------------------

    /// Returns the column list for both relations.
    fn column_definitions(&self) -> String {
        let mut definitions = vec![
            "entity_id TEXT NOT NULL".to_string(),
            "snapshot_ts INTEGER NOT NULL".to_string(),
            "ingested_at INTEGER NOT NULL".to_string(),
            "op_id TEXT NOT NULL".to_string(),
            "is_deleted INTEGER NOT NULL DEFAULT 0".to_string(),
            "attrs_hash INTEGER NOT NULL".to_string(),
        ];
        for column in self.layout.primary_key() {
            definitions.push(format!(
                "{} {} NOT NULL",
                quote_ident(&column.name),
                column.column_type.sql_type()
            ));
        }
        for column in self.layout.payload() {
            definitions
                .push(format!("{} {}", quote_ident(&column.name), column.column_type.sql_type()));
        }
        definitions.join(", ")
    }

    /// Returns the metadata plus user column projection.
    fn projection(&self) -> String {
        let mut names = vec![
            "entity_id".to_string(),
            "snapshot_ts".to_string(),
            "ingested_at".to_string(),
            "op_id".to_string(),
            "is_deleted".to_string(),
            "attrs_hash".to_string(),
        ];
        names.extend(self.layout.columns().map(|column| quote_ident(&column.name)));
        names.join(", ")
    }

    /// Returns the insert statement for a relation.
    fn insert_sql(&self, table: &str) -> String {
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            self.projection(),
            placeholders(METADATA_COLUMNS + self.layout.column_count())
        )
    }

    /// Returns a query selecting the latest version per entity.
    fn latest_sql(&self, table: &str, filter: &str, outer_filter: &str) -> String {
        let projection = self.projection();
        format!(
            "SELECT {projection} FROM (SELECT {projection}, ROW_NUMBER() OVER (PARTITION BY \
             entity_id ORDER BY {VERSION_ORDER}) AS version_rank FROM {table} WHERE {filter}) \
             WHERE version_rank = 1 {outer_filter} ORDER BY entity_id"
        )
    }

    /// Runs a projection query and decodes every row.
    fn query_rows<P: Params>(
        &self,
        connection: &Connection,
        sql: &str,
        params: P,
    ) -> Result<Vec<DimensionRow>, WarehouseError> {
        let mut stmt = connection.prepare_cached(sql).map_err(db_error)?;
        let mut rows = stmt.query(params).map_err(db_error)?;
        let mut decoded = Vec::new();
        while let Some(row) = rows.next().map_err(db_error)? {
            decoded.push(self.decode_row(row)?);
        }
        Ok(decoded)
    }

    /// Decodes one projection row.
    fn decode_row(&self, row: &rusqlite::Row<'_>) -> Result<DimensionRow, WarehouseError> {
        let entity_id: String = row.get(0).map_err(db_error)?;
        let snapshot_ms: i64 = row.get(1).map_err(db_error)?;
        let ingested_ms: i64 = row.get(2).map_err(db_error)?;
        let op_text: String = row.get(3).map_err(db_error)?;
        let is_deleted: i64 = row.get(4).map_err(db_error)?;
        let attrs_hash: i64 = row.get(5).map_err(db_error)?;
        let op_id = op_text
            .parse::<OpId>()
            .map_err(|err| WarehouseError::Corrupt(format!("invalid op_id {op_text}: {err}")))?;
        let mut columns = BTreeMap::new();
        for (offset, column) in self.layout.columns().enumerate() {
            let raw = row.get_ref(METADATA_COLUMNS + offset).map_err(db_error)?;
            columns.insert(column.name.clone(), decode_value(column, raw)?);
        }
        Ok(DimensionRow {
            entity_id: SurrogateKey::new(entity_id),
            snapshot_ts: from_unix_millis(snapshot_ms)?,
            ingested_at: from_unix_millis(ingested_ms)?,
            op_id,
            is_deleted: is_deleted != 0,
            attrs_hash,
            columns,
        })
    }

    /// Returns payload values of a row in layout order.
    fn payload_values(&self, row: &DimensionRow) -> Vec<Value> {
        self.layout
            .payload()
            .iter()
            .map(|column| row.get(&column.name).cloned().unwrap_or_default())
            .collect()
    }

    /// Returns primary-key and payload values of a row in layout order.
    fn ordered_values(&self, row: &DimensionRow) -> Vec<Value> {
        self.layout
            .columns()
            .map(|column| row.get(&column.name).cloned().unwrap_or_default())
            .collect()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns `n` comma-separated positional placeholders.
fn placeholders(n: usize) -> String {
    (1 ..= n).map(|index| format!("?{index}")).collect::<Vec<_>>().join(", ")
}

/// Builds insert parameters in projection order.
fn insert_params(
    entity_id: &SurrogateKey,
    snapshot_ms: i64,
    stamp: &WriteStamp,
    is_deleted: bool,
    attrs_hash: i64,
    values: &[Value],
) -> Vec<SqlValue> {
    let mut params = Vec::with_capacity(METADATA_COLUMNS + values.len());
    params.push(SqlValue::Text(entity_id.as_str().to_string()));
    params.push(SqlValue::Integer(snapshot_ms));
    params.push(SqlValue::Integer(stamp.ingested_ms));
    params.push(SqlValue::Text(stamp.op_id.clone()));
    params.push(SqlValue::Integer(i64::from(is_deleted)));
    params.push(SqlValue::Integer(attrs_hash));
    params.extend(values.iter().map(to_sql_value));
    params
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

    struct Devices;

    impl DimensionSchema for Devices {
        fn name(&self) -> &str {
            "devices"
        }

        fn primary_key_columns(&self) -> &[&str] {
            &["pk:VARCHAR"]
        }

        fn payload_columns(&self) -> &[&str] {
            &["group:VARCHAR", "max_users:INTEGER"]
        }
    }

    #[test]
    fn placeholders_are_positional() {
        assert_eq!(placeholders(3), "?1, ?2, ?3");
        assert_eq!(placeholders(0), "");
    }

    #[test]
    fn projection_quotes_user_columns() {
        let dataset = DimensionDataset::new(&Devices).unwrap();
        assert_eq!(
            dataset.projection(),
            "entity_id, snapshot_ts, ingested_at, op_id, is_deleted, attrs_hash, \"pk\", \
             \"group\", \"max_users\""
        );
        assert!(dataset.insert_sql("t").ends_with("VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"));
    }

    #[test]
    fn latest_sql_ranks_by_version_tuple() {
        let dataset = DimensionDataset::new(&Devices).unwrap();
        let sql = dataset.latest_sql("dim_devices_history", "1 = 1", "AND is_deleted = 0");
        assert!(sql.contains(
            "PARTITION BY entity_id ORDER BY snapshot_ts DESC, ingested_at DESC, op_id DESC, \
             rowid DESC"
        ));
        assert!(sql.contains("WHERE version_rank = 1 AND is_deleted = 0"));
    }
}
