// crates/lake-store-sqlite/src/fact.rs
// ============================================================================
// Module: Append-Only Fact Writer
// Description: Sub-batched inserts into append-only fact relations.
// Purpose: Persist event rows with bounded transactions and cancellation.
// Dependencies: lake-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! A [`FactDataset`] writes rows into `fact_<name>`. Each sub-batch commits
//! in its own transaction; cancellation rolls back the in-flight sub-batch
//! and keeps earlier ones. Replacing deduplication is a property of the
//! relation (unique key plus a version-guarded upsert), not of the writer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use lake_core::CancelToken;
use lake_core::ColumnSpec;
use lake_core::DedupMode;
use lake_core::FactLayout;
use lake_core::FactSchema;
use lake_core::RowResult;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use tracing::debug;
use tracing::info;

use crate::codec::coerce_row;
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

/// Default rows per fact sub-batch.
pub const DEFAULT_FACT_BATCH_SIZE: usize = 50_000;

// ============================================================================
// SECTION: Dataset
// ============================================================================

/// Append-only fact dataset.
#[derive(Debug, Clone)]
pub struct FactDataset {
    /// Validated layout.
    layout: Arc<FactLayout>,
    /// Fact relation name.
    table: String,
    /// Rows per committed sub-batch.
    batch_size: usize,
}

impl FactDataset {
    /// Builds a dataset from a schema.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Schema`] when the schema is invalid.
    pub fn new(schema: &dyn FactSchema) -> Result<Self, WarehouseError> {
        let layout = FactLayout::from_schema(schema)?;
        Ok(Self {
            table: layout.table_name(),
            layout: Arc::new(layout),
            batch_size: DEFAULT_FACT_BATCH_SIZE,
        })
    }

    /// Overrides the sub-batch size.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Invalid`] when `batch_size` is zero.
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, WarehouseError> {
        if batch_size == 0 {
            return Err(WarehouseError::Invalid("batch size must be greater than zero".to_string()));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Returns the validated layout.
    #[must_use]
    pub fn layout(&self) -> &FactLayout {
        &self.layout
    }

    /// Returns the fact relation name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Returns the sub-batch size.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Creates the relation and its indexes, and records the layout.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when DDL fails or the recorded layout
    /// differs from this one.
    pub fn ensure_table(&self, warehouse: &Warehouse) -> Result<(), WarehouseError> {
        warehouse.ensure_once(&self.table, |connection| {
            let tx = connection.transaction().map_err(db_error)?;
            register_dataset(&tx, DatasetKind::Fact, self.layout.name(), &self.layout.signature())?;
            let table = &self.table;
            let definitions = self
                .layout
                .columns()
                .iter()
                .map(|column| {
                    format!("{} {}", quote_ident(&column.name), column.column_type.sql_type())
                })
                .collect::<Vec<_>>()
                .join(", ");
            let mut ddl = format!("CREATE TABLE IF NOT EXISTS {table} ({definitions});");
            if !self.layout.unique_key().is_empty() {
                let unique = match self.layout.dedup_mode() {
                    DedupMode::Replacing => "UNIQUE ",
                    DedupMode::None => "",
                };
                ddl.push_str(&format!(
                    "CREATE {unique}INDEX IF NOT EXISTS idx_{table}_key ON {table} ({});",
                    self.key_list()
                ));
            }
            if self.layout.partition_by_time()
                && let Some(time_column) = self.layout.time_column()
            {
                ddl.push_str(&format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_time ON {table} ({});",
                    quote_ident(time_column)
                ));
            }
            tx.execute_batch(&ddl).map_err(db_error)?;
            tx.commit().map_err(db_error)
        })
    }

    /// Appends `count` rows produced by `row_fn`.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::RowShape`], [`WarehouseError::RowSource`],
    /// [`WarehouseError::Schema`], or [`WarehouseError::Cancelled`]; rows of
    /// already committed sub-batches remain.
    pub fn write_batch<F>(
        &self,
        warehouse: &Warehouse,
        count: usize,
        mut row_fn: F,
        cancel: &CancelToken,
    ) -> Result<usize, WarehouseError>
    where
        F: FnMut(usize) -> RowResult,
    {
        self.ensure_table(warehouse)?;
        if count == 0 {
            return Ok(0);
        }
        let columns: Vec<&ColumnSpec> = self.layout.columns().iter().collect();
        let sql = self.insert_sql();
        let mut start = 0;
        while start < count {
            let end = count.min(start.saturating_add(self.batch_size));
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
                        let values = coerce_row(&columns, 0, index, values)?;
                        let params: Vec<SqlValue> = values.iter().map(to_sql_value).collect();
                        stmt.execute(params_from_iter(params.iter())).map_err(db_error)?;
                    }
                }
                tx.commit().map_err(db_error)
            })?;
            debug!(dataset = self.layout.name(), rows = end - start, "committed fact sub-batch");
            start = end;
        }
        info!(dataset = self.layout.name(), rows = count, "fact rows written");
        Ok(count)
    }

    /// Returns the quoted unique key column list.
    fn key_list(&self) -> String {
        self.layout.unique_key().iter().map(|name| quote_ident(name)).collect::<Vec<_>>().join(", ")
    }

    /// Returns the insert statement, with a version-guarded upsert for
    /// replacing relations.
    fn insert_sql(&self) -> String {
        let columns = self.layout.columns();
        let names =
            columns.iter().map(|column| quote_ident(&column.name)).collect::<Vec<_>>().join(", ");
        let placeholders =
            (1 ..= columns.len()).map(|index| format!("?{index}")).collect::<Vec<_>>().join(", ");
        let mut sql = format!("INSERT INTO {} ({names}) VALUES ({placeholders})", self.table);
        if self.layout.dedup_mode() == DedupMode::Replacing
            && let Some(version) = self.layout.dedup_version_column()
        {
            let version = quote_ident(version);
            let updates = columns
                .iter()
                .filter(|column| !self.layout.unique_key().contains(&column.name))
                .map(|column| {
                    let name = quote_ident(&column.name);
                    format!("{name} = excluded.{name}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO UPDATE SET {updates} WHERE excluded.{version} >= {}.{version}",
                self.key_list(),
                self.table
            ));
        }
        sql
    }
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

    struct Latest;

    impl FactSchema for Latest {
        fn name(&self) -> &str {
            "latest"
        }

        fn columns(&self) -> &[&str] {
            &["key:VARCHAR", "value:INTEGER", "version:INTEGER"]
        }

        fn unique_key_columns(&self) -> &[&str] {
            &["key"]
        }

        fn dedup_mode(&self) -> DedupMode {
            DedupMode::Replacing
        }

        fn dedup_version_column(&self) -> Option<&str> {
            Some("version")
        }
    }

    #[test]
    fn replacing_insert_guards_on_version() {
        let dataset = FactDataset::new(&Latest).unwrap();
        assert_eq!(
            dataset.insert_sql(),
            "INSERT INTO fact_latest (\"key\", \"value\", \"version\") VALUES (?1, ?2, ?3) ON \
             CONFLICT (\"key\") DO UPDATE SET \"value\" = excluded.\"value\", \"version\" = \
             excluded.\"version\" WHERE excluded.\"version\" >= fact_latest.\"version\""
        );
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dataset = FactDataset::new(&Latest).unwrap();
        assert!(matches!(dataset.with_batch_size(0), Err(WarehouseError::Invalid(_))));
    }
}
