// crates/lake-indexer/src/usage/store.rs
// ============================================================================
// Module: Usage Store
// Description: Append and query interface counter facts.
// Purpose: Persist usage rows and answer the refresh window queries.
// Dependencies: lake-core, lake-store-sqlite, rusqlite, time
// ============================================================================

//! ## Overview
//! [`UsageStore`] appends [`InterfaceUsage`] rows through the fact writer
//! and answers the queries an incremental refresh needs: the latest stored
//! event, the latest event per interface, the stored extent, and the last
//! known sparse counter values before a window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lake_core::CancelToken;
use lake_core::from_unix_millis;
use lake_core::to_unix_millis;
use lake_store_sqlite::FactDataset;
use lake_store_sqlite::Warehouse;
use lake_store_sqlite::WarehouseError;
use rusqlite::Connection;
use rusqlite::params;
use time::Duration;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::usage::schema::InterfaceCountersSchema;
use crate::usage::schema::usage_row;
use crate::usage::types::Counter;
use crate::usage::types::CounterBaselines;
use crate::usage::types::DataBoundaries;
use crate::usage::types::InterfaceUsage;
use crate::usage::types::MaxTimestampsByKey;
use crate::usage::types::interface_key;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// How far before a window baseline queries look.
pub const BASELINE_LOOKBACK: Duration = Duration::days(90);

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store for interface usage facts.
#[derive(Clone)]
pub struct UsageStore {
    /// Warehouse handle.
    warehouse: Warehouse,
    /// Interface counter relation.
    dataset: FactDataset,
}

impl UsageStore {
    /// Creates a store over an open warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the fact layout is rejected.
    pub fn new(warehouse: Warehouse) -> Result<Self, StoreError> {
        let dataset = FactDataset::new(&InterfaceCountersSchema)?;
        Ok(Self {
            warehouse,
            dataset,
        })
    }

    /// Appends usage rows. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub fn insert_interface_usage(&self, usage: &[InterfaceUsage]) -> Result<usize, StoreError> {
        let ingested_at = OffsetDateTime::now_utc();
        let written = self.dataset.write_batch(
            &self.warehouse,
            usage.len(),
            |index| usage_row(&usage[index], ingested_at),
            &CancelToken::new(),
        )?;
        Ok(written)
    }

    /// Returns the latest stored event time, `None` when empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn max_timestamp(&self) -> Result<Option<OffsetDateTime>, StoreError> {
        let sql = format!("SELECT max(event_ts) FROM {}", self.table());
        let max = self.read(|connection| {
            connection.query_row(&sql, [], |row| row.get::<_, Option<i64>>(0)).map_err(db_error)
        })?;
        Ok(max.map(from_unix_millis).transpose().map_err(WarehouseError::from)?)
    }

    /// Returns the latest stored event per `device_pk:intf` at or after
    /// `since`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn max_timestamps_by_key(
        &self,
        since: OffsetDateTime,
    ) -> Result<MaxTimestampsByKey, StoreError> {
        let sql = format!(
            "SELECT device_pk, intf, max(event_ts) FROM {} WHERE event_ts >= ?1 AND device_pk IS \
             NOT NULL AND intf IS NOT NULL GROUP BY device_pk, intf",
            self.table()
        );
        let since_ms = to_unix_millis(since);
        self.read(|connection| {
            let mut stmt = connection.prepare(&sql).map_err(db_error)?;
            let mut rows = stmt.query(params![since_ms]).map_err(db_error)?;
            let mut result = MaxTimestampsByKey::new();
            while let Some(row) = rows.next().map_err(db_error)? {
                let device_pk: String = row.get(0).map_err(db_error)?;
                let intf: String = row.get(1).map_err(db_error)?;
                let max_ms: i64 = row.get(2).map_err(db_error)?;
                result.insert(interface_key(&device_pk, &intf), from_unix_millis(max_ms)?);
            }
            Ok(result)
        })
    }

    /// Returns the stored extent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn data_boundaries(&self) -> Result<DataBoundaries, StoreError> {
        let sql = format!("SELECT min(event_ts), max(event_ts), count(*) FROM {}", self.table());
        self.read(|connection| {
            let (min_ms, max_ms, count) = connection
                .query_row(&sql, [], |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(db_error)?;
            Ok(DataBoundaries {
                min_time: min_ms.map(from_unix_millis).transpose()?,
                max_time: max_ms.map(from_unix_millis).transpose()?,
                row_count: u64::try_from(count).unwrap_or_default(),
            })
        })
    }

    /// Returns the latest non-null sparse counter values per interface in
    /// `[before - 90 days, before)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a query fails.
    pub fn baselines_before(&self, before: OffsetDateTime) -> Result<CounterBaselines, StoreError> {
        let start_ms = to_unix_millis(before - BASELINE_LOOKBACK);
        let end_ms = to_unix_millis(before);
        let table = self.table().to_string();
        self.read(|connection| {
            let mut baselines = CounterBaselines::new();
            for counter in Counter::ALL.into_iter().filter(|counter| counter.is_sparse()) {
                let column = counter.column();
                let sql = format!(
                    "SELECT device_pk, intf, {column} FROM (SELECT device_pk, intf, {column}, \
                     ROW_NUMBER() OVER (PARTITION BY device_pk, intf ORDER BY event_ts DESC, \
                     rowid DESC) AS rn FROM {table} WHERE event_ts >= ?1 AND event_ts < ?2 AND \
                     {column} IS NOT NULL AND device_pk IS NOT NULL AND intf IS NOT NULL) WHERE \
                     rn = 1"
                );
                let mut stmt = connection.prepare(&sql).map_err(db_error)?;
                let mut rows = stmt.query(params![start_ms, end_ms]).map_err(db_error)?;
                while let Some(row) = rows.next().map_err(db_error)? {
                    let device_pk: String = row.get(0).map_err(db_error)?;
                    let intf: String = row.get(1).map_err(db_error)?;
                    let value: i64 = row.get(2).map_err(db_error)?;
                    baselines.entry(interface_key(&device_pk, &intf)).or_default()
                        [counter.index()] = Some(value);
                }
            }
            Ok(baselines)
        })
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Returns the relation name.
    fn table(&self) -> &str {
        self.dataset.table_name()
    }

    /// Runs a read after making sure the relation exists.
    fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, WarehouseError>,
    {
        self.dataset.ensure_table(&self.warehouse)?;
        Ok(self.warehouse.with_read(f)?)
    }
}

/// Maps a `rusqlite` error into [`WarehouseError::Db`].
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err adapter.")]
fn db_error(err: rusqlite::Error) -> WarehouseError {
    WarehouseError::Db(err.to_string())
}
