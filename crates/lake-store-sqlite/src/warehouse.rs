// crates/lake-store-sqlite/src/warehouse.rs
// ============================================================================
// Module: SQLite Warehouse
// Description: Warehouse client owning the SQLite write and read connections.
// Purpose: Provide explicit open/close, connection access, and the catalog.
// Dependencies: lake-core, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`Warehouse`] is the explicit client handle that every dataset operation
//! receives. It owns one write connection behind a mutex and a round-robin
//! pool of query-only read connections; in WAL mode readers never block the
//! writer. The `dataset_catalog` relation records the layout signature each
//! dataset was created with so later opens can reject layout drift.
//!
//! Security posture: dataset and column names are validated identifiers
//! before they are embedded into SQL; values are always bound as parameters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use lake_core::SchemaError;
use lake_core::TimestampRangeError;
use lake_core::now_millis;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Warehouse metadata schema version.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default staging retention (7 days).
const DEFAULT_STAGING_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Default staging sub-batch size.
pub const DEFAULT_STAGING_BATCH_SIZE: usize = 10_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl JournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the warehouse.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `read_pool_size` and `staging_batch_size` are greater than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: JournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Number of read connections.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
    /// Age after which staging rows are purged, in seconds.
    #[serde(default = "default_staging_ttl_secs")]
    pub staging_ttl_secs: u64,
    /// Rows committed per staging sub-batch.
    #[serde(default = "default_staging_batch_size")]
    pub staging_batch_size: usize,
}

impl WarehouseConfig {
    /// Builds a configuration with defaults for everything but the path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
            sync_mode: SyncMode::default(),
            read_pool_size: default_read_pool_size(),
            staging_ttl_secs: default_staging_ttl_secs(),
            staging_batch_size: default_staging_batch_size(),
        }
    }

    /// Validates runtime limits.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Invalid`] when a limit is out of range.
    pub fn validate(&self) -> Result<(), WarehouseError> {
        validate_store_path(&self.path)?;
        if self.read_pool_size == 0 {
            return Err(WarehouseError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.staging_batch_size == 0 {
            return Err(WarehouseError::Invalid(
                "staging_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.staging_ttl_secs == 0 {
            return Err(WarehouseError::Invalid(
                "staging_ttl_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the staging retention window in milliseconds.
    #[must_use]
    pub fn staging_ttl_millis(&self) -> i64 {
        i64::try_from(self.staging_ttl_secs.saturating_mul(1_000)).unwrap_or(i64::MAX)
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Returns the default staging retention.
const fn default_staging_ttl_secs() -> u64 {
    DEFAULT_STAGING_TTL_SECS
}

/// Returns the default staging sub-batch size.
const fn default_staging_batch_size() -> usize {
    DEFAULT_STAGING_BATCH_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Warehouse errors.
///
/// # Invariants
/// - Error messages never embed row payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WarehouseError {
    /// Warehouse I/O error.
    #[error("warehouse io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("warehouse db error: {0}")]
    Db(String),
    /// Stored data could not be decoded.
    #[error("warehouse corruption: {0}")]
    Corrupt(String),
    /// Metadata schema version mismatch.
    #[error("warehouse version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid configuration or request.
    #[error("warehouse invalid request: {0}")]
    Invalid(String),
    /// Dataset schema or value type violation.
    #[error("{0}")]
    Schema(String),
    /// Row producer returned the wrong number of values.
    #[error("row {index} has {actual} columns, expected exactly {expected}")]
    RowShape {
        /// Row index.
        index: usize,
        /// Values returned.
        actual: usize,
        /// Values required.
        expected: usize,
    },
    /// Row producer failed.
    #[error("failed to get row data {index}: {message}")]
    RowSource {
        /// Row index.
        index: usize,
        /// Producer error message.
        message: String,
    },
    /// Write cancelled through its cancel token.
    #[error("write cancelled during batch insert")]
    Cancelled,
}

impl From<SchemaError> for WarehouseError {
    fn from(error: SchemaError) -> Self {
        Self::Schema(error.to_string())
    }
}

impl From<TimestampRangeError> for WarehouseError {
    fn from(error: TimestampRangeError) -> Self {
        Self::Corrupt(error.to_string())
    }
}

/// Maps a `rusqlite` error into [`WarehouseError::Db`].
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err adapter.")]
pub(crate) fn db_error(err: rusqlite::Error) -> WarehouseError {
    WarehouseError::Db(err.to_string())
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Dataset kinds recorded in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Versioned dimension.
    Dimension,
    /// Append-only fact relation.
    Fact,
}

impl DatasetKind {
    /// Returns the stored label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dimension => "dimension",
            Self::Fact => "fact",
        }
    }

    /// Parses a stored label.
    fn parse(label: &str) -> Result<Self, WarehouseError> {
        match label {
            "dimension" => Ok(Self::Dimension),
            "fact" => Ok(Self::Fact),
            other => Err(WarehouseError::Corrupt(format!("unknown dataset kind: {other}"))),
        }
    }
}

/// Catalog entry describing a created dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Dataset kind.
    pub kind: DatasetKind,
    /// Dataset name.
    pub name: String,
    /// Layout signature recorded at creation.
    pub signature: String,
    /// Creation time in unix milliseconds.
    pub created_at: i64,
}

/// Records a dataset layout or checks it against the recorded one.
pub(crate) fn register_dataset(
    tx: &rusqlite::Transaction<'_>,
    kind: DatasetKind,
    name: &str,
    signature: &str,
) -> Result<(), WarehouseError> {
    let existing: Option<String> = tx
        .query_row(
            "SELECT signature FROM dataset_catalog WHERE kind = ?1 AND name = ?2",
            params![kind.as_str(), name],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_error)?;
    match existing {
        None => {
            tx.execute(
                "INSERT INTO dataset_catalog (kind, name, signature, created_at) VALUES (?1, ?2, \
                 ?3, ?4)",
                params![kind.as_str(), name, signature, now_millis()],
            )
            .map_err(db_error)?;
            info!(dataset = name, kind = kind.as_str(), "registered dataset");
            Ok(())
        }
        Some(recorded) if recorded == signature => Ok(()),
        Some(recorded) => Err(WarehouseError::Schema(format!(
            "{} {name} layout changed (recorded {recorded}, declared {signature}); schema \
             evolution is not supported",
            kind.as_str()
        ))),
    }
}

// ============================================================================
// SECTION: Warehouse
// ============================================================================

/// `SQLite`-backed warehouse client.
///
/// # Invariants
/// - All writes go through the single write connection.
/// - Read connections are query-only.
/// - Once closed, every operation fails with [`WarehouseError::Invalid`].
#[derive(Clone)]
pub struct Warehouse {
    /// Warehouse configuration.
    config: Arc<WarehouseConfig>,
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read-only connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
    /// Relations already created during this process.
    ensured: Arc<Mutex<BTreeSet<String>>>,
    /// Set once [`Warehouse::close`] runs.
    closed: Arc<AtomicBool>,
    /// Last ingest time issued, in unix milliseconds.
    last_ingest: Arc<AtomicI64>,
}

impl Warehouse {
    /// Opens (creating if needed) the warehouse database.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the configuration is invalid or the
    /// database cannot be opened or initialized.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let mut write_connection = open_connection(&config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            let read_connection = open_connection(&config)?;
            read_connection.execute_batch("PRAGMA query_only = ON;").map_err(db_error)?;
            read_connections.push(Mutex::new(read_connection));
        }
        info!(
            path = %config.path.display(),
            read_pool_size = config.read_pool_size,
            journal_mode = config.journal_mode.pragma_value(),
            "warehouse opened"
        );
        Ok(Self {
            config: Arc::new(config),
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
            ensured: Arc::new(Mutex::new(BTreeSet::new())),
            closed: Arc::new(AtomicBool::new(false)),
            last_ingest: Arc::new(AtomicI64::new(0)),
        })
    }

    /// Returns the warehouse configuration.
    #[must_use]
    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Returns true once the warehouse was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Checkpoints the WAL and marks the warehouse closed for every clone.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the checkpoint fails.
    pub fn close(&self) -> Result<(), WarehouseError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let guard = self
            .write_connection
            .lock()
            .map_err(|_| WarehouseError::Io("warehouse write mutex poisoned".to_string()))?;
        if self.config.journal_mode == JournalMode::Wal {
            guard.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);").map_err(db_error)?;
        }
        guard.execute_batch("PRAGMA optimize;").map_err(db_error)?;
        drop(guard);
        info!(path = %self.config.path.display(), "warehouse closed");
        Ok(())
    }

    /// Verifies a read connection can execute a simple statement.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] if the warehouse is closed or the query fails.
    pub fn check_connection(&self) -> Result<(), WarehouseError> {
        self.with_read(|connection| {
            connection.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).map_err(db_error)?;
            Ok(())
        })
    }

    /// Runs a closure against the write connection.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] if the warehouse is closed, the mutex is
    /// poisoned, or the closure fails.
    pub fn with_write<T, F>(&self, f: F) -> Result<T, WarehouseError>
    where
        F: FnOnce(&mut Connection) -> Result<T, WarehouseError>,
    {
        self.ensure_open()?;
        let mut guard = self
            .write_connection
            .lock()
            .map_err(|_| WarehouseError::Io("warehouse write mutex poisoned".to_string()))?;
        f(&mut *guard)
    }

    /// Runs a closure against the next read connection.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] if the warehouse is closed, the mutex is
    /// poisoned, or the closure fails.
    pub fn with_read<T, F>(&self, f: F) -> Result<T, WarehouseError>
    where
        F: FnOnce(&Connection) -> Result<T, WarehouseError>,
    {
        self.ensure_open()?;
        let guard = self
            .read_connection()
            .lock()
            .map_err(|_| WarehouseError::Io("warehouse read mutex poisoned".to_string()))?;
        f(&*guard)
    }

    /// Lists catalog entries ordered by kind and name.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the catalog cannot be read.
    pub fn list_datasets(&self) -> Result<Vec<CatalogEntry>, WarehouseError> {
        self.with_read(|connection| {
            let mut stmt = connection
                .prepare(
                    "SELECT kind, name, signature, created_at FROM dataset_catalog ORDER BY kind, \
                     name",
                )
                .map_err(db_error)?;
            let mut rows = stmt.query([]).map_err(db_error)?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next().map_err(db_error)? {
                let kind: String = row.get(0).map_err(db_error)?;
                entries.push(CatalogEntry {
                    kind: DatasetKind::parse(&kind)?,
                    name: row.get(1).map_err(db_error)?,
                    signature: row.get(2).map_err(db_error)?,
                    created_at: row.get(3).map_err(db_error)?,
                });
            }
            Ok(entries)
        })
    }

    /// Runs `init` on the write connection once per relation key and process.
    pub(crate) fn ensure_once<F>(&self, key: &str, init: F) -> Result<(), WarehouseError>
    where
        F: FnOnce(&mut Connection) -> Result<(), WarehouseError>,
    {
        let mut ensured = self
            .ensured
            .lock()
            .map_err(|_| WarehouseError::Io("warehouse catalog mutex poisoned".to_string()))?;
        if ensured.contains(key) {
            return Ok(());
        }
        self.with_write(init)?;
        ensured.insert(key.to_string());
        debug!(relation = key, "relations ensured");
        Ok(())
    }

    /// Returns an ingest time strictly greater than any issued before by
    /// this warehouse, so writes within one millisecond stay ordered.
    pub(crate) fn next_ingest_millis(&self) -> i64 {
        let now = now_millis();
        let mut issued = now;
        let _ = self.last_ingest.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            issued = now.max(last.saturating_add(1));
            Some(issued)
        });
        issued
    }

    /// Fails once the warehouse has been closed.
    fn ensure_open(&self) -> Result<(), WarehouseError> {
        if self.is_closed() {
            return Err(WarehouseError::Invalid("warehouse is closed".to_string()));
        }
        Ok(())
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> &Mutex<Connection> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        &self.read_connections[index]
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the warehouse exists.
fn ensure_parent_dir(path: &Path) -> Result<(), WarehouseError> {
    let Some(parent) = path.parent() else {
        return Err(WarehouseError::Io("warehouse path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| WarehouseError::Io(err.to_string()))
}

/// Validates warehouse paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), WarehouseError> {
    if path.as_os_str().is_empty() {
        return Err(WarehouseError::Invalid("warehouse path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(WarehouseError::Invalid("warehouse path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(WarehouseError::Invalid(
                "warehouse path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(WarehouseError::Invalid(
            "warehouse path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &WarehouseConfig) -> Result<Connection, WarehouseError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(connection: &Connection, config: &WarehouseConfig) -> Result<(), WarehouseError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(())
}

/// Initializes the metadata schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), WarehouseError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS dataset_catalog (
                    kind TEXT NOT NULL,
                    name TEXT NOT NULL,
                    signature TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    PRIMARY KEY (kind, name)
                );",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(WarehouseError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

/// Quotes a validated identifier for embedding in SQL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

// ============================================================================
// SECTION: Tests
// ============================================================================
