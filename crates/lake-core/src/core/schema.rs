// crates/lake-core/src/core/schema.rs
// ============================================================================
// Module: Lake Schemas
// Description: Column specs, schema traits, and validated dataset layouts.
// Purpose: Turn declarative "name:TYPE" schemas into checked layouts.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Domain adapters describe datasets through [`DimensionSchema`] and
//! [`FactSchema`]. Engines never consume those traits directly; they parse
//! them into [`DimensionLayout`] and [`FactLayout`], which validate names,
//! types, and structural rules once at construction. Dataset and column
//! names are embedded into SQL identifiers, so they are restricted to a
//! conservative character set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::value::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a dataset or column name.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Metadata columns owned by the dimension engine.
pub const RESERVED_DIMENSION_COLUMNS: [&str; 6] =
    ["entity_id", "snapshot_ts", "ingested_at", "op_id", "is_deleted", "attrs_hash"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema and value validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Structural schema violation.
    #[error("invalid schema: {0}")]
    Invalid(String),
    /// Value does not fit the declared column type.
    #[error("column {column} expects {expected}, got {actual}")]
    Type {
        /// Column name.
        column: String,
        /// Declared column type label.
        expected: &'static str,
        /// Provided value kind.
        actual: &'static str,
    },
}

// ============================================================================
// SECTION: Column Types
// ============================================================================

/// Canonical column types.
///
/// # Invariants
/// - `Timestamp` values are unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// UTF-8 text.
    Text,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Double,
    /// Boolean stored as 0/1.
    Boolean,
    /// Unix milliseconds.
    Timestamp,
}

impl ColumnType {
    /// Parses a type label (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] for unknown labels.
    pub fn parse(label: &str) -> Result<Self, SchemaError> {
        match label.trim().to_ascii_uppercase().as_str() {
            "VARCHAR" | "TEXT" | "STRING" => Ok(Self::Text),
            "INTEGER" | "BIGINT" | "INT" => Ok(Self::Integer),
            "DOUBLE" | "FLOAT" | "REAL" => Ok(Self::Double),
            "BOOLEAN" | "BOOL" => Ok(Self::Boolean),
            "TIMESTAMP" => Ok(Self::Timestamp),
            other => Err(SchemaError::Invalid(format!("unsupported column type: {other}"))),
        }
    }

    /// Returns the canonical label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Double => "DOUBLE",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    /// Returns the SQL storage type used for the column.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer | Self::Boolean | Self::Timestamp => "INTEGER",
            Self::Double => "REAL",
        }
    }

    /// Coerces a value into this column type.
    ///
    /// `Null` passes through; integers widen into doubles; 0/1 integers
    /// become booleans.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Type`] when the value cannot be represented.
    #[allow(clippy::cast_precision_loss, reason = "Integer to double widening is intended.")]
    pub fn coerce(self, column: &str, value: Value) -> Result<Value, SchemaError> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Text, Value::Text(text)) => Ok(Value::Text(text)),
            (Self::Integer | Self::Timestamp, Value::Int(number)) => Ok(Value::Int(number)),
            (Self::Double, Value::Float(number)) => Ok(Value::Float(number)),
            (Self::Double, Value::Int(number)) => Ok(Value::Float(number as f64)),
            (Self::Boolean, Value::Bool(flag)) => Ok(Value::Bool(flag)),
            (Self::Boolean, Value::Int(0)) => Ok(Value::Bool(false)),
            (Self::Boolean, Value::Int(1)) => Ok(Value::Bool(true)),
            (expected, other) => Err(SchemaError::Type {
                column: column.to_string(),
                expected: expected.label(),
                actual: other.kind(),
            }),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed column descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// Parses a `"name:TYPE"` descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] for malformed descriptors.
    pub fn parse(spec: &str) -> Result<Self, SchemaError> {
        let Some((name, label)) = spec.split_once(':') else {
            return Err(SchemaError::Invalid(format!("column spec must be name:TYPE: {spec}")));
        };
        let name = name.trim();
        validate_identifier("column", name)?;
        Ok(Self {
            name: name.to_string(),
            column_type: ColumnType::parse(label)?,
        })
    }
}

// ============================================================================
// SECTION: Dimension Schema
// ============================================================================

/// Declarative description of a versioned dimension.
pub trait DimensionSchema: Send + Sync {
    /// Entity-type name used to derive relation names.
    fn name(&self) -> &str;
    /// Ordered natural-key column specs (`"name:TYPE"`).
    fn primary_key_columns(&self) -> &[&str];
    /// Ordered payload column specs (`"name:TYPE"`).
    fn payload_columns(&self) -> &[&str];
}

/// Validated dimension layout.
///
/// # Invariants
/// - At least one primary-key column.
/// - Column names are unique and never reserved metadata names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionLayout {
    /// Entity-type name.
    name: String,
    /// Natural-key columns.
    primary_key: Vec<ColumnSpec>,
    /// Payload columns.
    payload: Vec<ColumnSpec>,
}

impl DimensionLayout {
    /// Parses and validates a dimension schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] when the schema is malformed.
    pub fn from_schema(schema: &dyn DimensionSchema) -> Result<Self, SchemaError> {
        let name = schema.name().trim();
        if name.is_empty() {
            return Err(SchemaError::Invalid("dimension name must be non-empty".to_string()));
        }
        validate_identifier("dimension", name)?;
        if schema.primary_key_columns().is_empty() {
            return Err(SchemaError::Invalid(format!(
                "dimension {name} must declare at least one primary key column"
            )));
        }
        let primary_key = parse_columns(schema.primary_key_columns())?;
        let payload = parse_columns(schema.payload_columns())?;
        let mut seen = BTreeSet::new();
        for column in primary_key.iter().chain(payload.iter()) {
            if RESERVED_DIMENSION_COLUMNS.contains(&column.name.as_str()) {
                return Err(SchemaError::Invalid(format!(
                    "column {} is reserved for dimension metadata",
                    column.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::Invalid(format!("duplicate column {}", column.name)));
            }
        }
        Ok(Self {
            name: name.to_string(),
            primary_key,
            payload,
        })
    }

    /// Returns the entity-type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the natural-key columns.
    #[must_use]
    pub fn primary_key(&self) -> &[ColumnSpec] {
        &self.primary_key
    }

    /// Returns the payload columns.
    #[must_use]
    pub fn payload(&self) -> &[ColumnSpec] {
        &self.payload
    }

    /// Returns all user columns, primary key first.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.primary_key.iter().chain(self.payload.iter())
    }

    /// Returns the number of values a row producer must return.
    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.primary_key.len() + self.payload.len()
    }

    /// Returns the history relation name.
    #[must_use]
    pub fn history_table_name(&self) -> String {
        format!("dim_{}_history", self.name)
    }

    /// Returns the staging relation name.
    #[must_use]
    pub fn staging_table_name(&self) -> String {
        format!("stg_dim_{}_snapshot", self.name)
    }

    /// Returns a stable textual signature of the column layout.
    #[must_use]
    pub fn signature(&self) -> String {
        format!("pk[{}] payload[{}]", render_columns(&self.primary_key), render_columns(&self.payload))
    }
}

// ============================================================================
// SECTION: Fact Schema
// ============================================================================

/// Deduplication behavior declared on a fact relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// Rows are appended as-is.
    #[default]
    None,
    /// Rows sharing the unique key keep the greatest version column.
    Replacing,
}

/// Declarative description of an append-only fact relation.
pub trait FactSchema: Send + Sync {
    /// Fact name used to derive the relation name.
    fn name(&self) -> &str;
    /// Ordered column specs (`"name:TYPE"`).
    fn columns(&self) -> &[&str];
    /// Column names forming the logical unique key.
    fn unique_key_columns(&self) -> &[&str] {
        &[]
    }
    /// Event-time column name.
    fn time_column(&self) -> Option<&str> {
        None
    }
    /// Whether the relation is organized by the time column.
    fn partition_by_time(&self) -> bool {
        false
    }
    /// Deduplication behavior.
    fn dedup_mode(&self) -> DedupMode {
        DedupMode::None
    }
    /// Version column used by [`DedupMode::Replacing`].
    fn dedup_version_column(&self) -> Option<&str> {
        None
    }
}

/// Validated fact layout.
///
/// # Invariants
/// - Unique key, time, and version columns are declared columns.
/// - [`DedupMode::Replacing`] carries a unique key and a version column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactLayout {
    /// Fact name.
    name: String,
    /// Declared columns.
    columns: Vec<ColumnSpec>,
    /// Unique key column names.
    unique_key: Vec<String>,
    /// Event-time column name.
    time_column: Option<String>,
    /// Whether to organize by time.
    partition_by_time: bool,
    /// Deduplication behavior.
    dedup_mode: DedupMode,
    /// Version column for replacing dedup.
    dedup_version_column: Option<String>,
}

impl FactLayout {
    /// Parses and validates a fact schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Invalid`] when the schema is malformed.
    pub fn from_schema(schema: &dyn FactSchema) -> Result<Self, SchemaError> {
        let name = schema.name().trim();
        if name.is_empty() {
            return Err(SchemaError::Invalid("fact name must be non-empty".to_string()));
        }
        validate_identifier("fact", name)?;
        if schema.columns().is_empty() {
            return Err(SchemaError::Invalid(format!("fact {name} must declare columns")));
        }
        let columns = parse_columns(schema.columns())?;
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::Invalid(format!("duplicate column {}", column.name)));
            }
        }
        let declared = |column: &str| seen.contains(column);
        let mut unique_key = Vec::with_capacity(schema.unique_key_columns().len());
        for column in schema.unique_key_columns() {
            if !declared(column) {
                return Err(SchemaError::Invalid(format!(
                    "unique key column {column} is not a declared column"
                )));
            }
            unique_key.push((*column).to_string());
        }
        let time_column = schema.time_column().map(str::to_string);
        if let Some(column) = &time_column
            && !declared(column)
        {
            return Err(SchemaError::Invalid(format!(
                "time column {column} is not a declared column"
            )));
        }
        if schema.partition_by_time() && time_column.is_none() {
            return Err(SchemaError::Invalid(
                "partition_by_time requires a time column".to_string(),
            ));
        }
        let dedup_version_column = schema.dedup_version_column().map(str::to_string);
        if schema.dedup_mode() == DedupMode::Replacing {
            let Some(version) = &dedup_version_column else {
                return Err(SchemaError::Invalid(
                    "replacing dedup requires a version column".to_string(),
                ));
            };
            if !declared(version) {
                return Err(SchemaError::Invalid(format!(
                    "version column {version} is not a declared column"
                )));
            }
            if unique_key.is_empty() {
                return Err(SchemaError::Invalid(
                    "replacing dedup requires unique key columns".to_string(),
                ));
            }
        }
        Ok(Self {
            name: name.to_string(),
            columns,
            unique_key,
            time_column,
            partition_by_time: schema.partition_by_time(),
            dedup_mode: schema.dedup_mode(),
            dedup_version_column,
        })
    }

    /// Returns the fact name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Returns the unique key column names.
    #[must_use]
    pub fn unique_key(&self) -> &[String] {
        &self.unique_key
    }

    /// Returns the time column name.
    #[must_use]
    pub fn time_column(&self) -> Option<&str> {
        self.time_column.as_deref()
    }

    /// Returns whether the relation is organized by time.
    #[must_use]
    pub const fn partition_by_time(&self) -> bool {
        self.partition_by_time
    }

    /// Returns the deduplication behavior.
    #[must_use]
    pub const fn dedup_mode(&self) -> DedupMode {
        self.dedup_mode
    }

    /// Returns the replacing version column.
    #[must_use]
    pub fn dedup_version_column(&self) -> Option<&str> {
        self.dedup_version_column.as_deref()
    }

    /// Returns the fact relation name.
    #[must_use]
    pub fn table_name(&self) -> String {
        format!("fact_{}", self.name)
    }

    /// Returns a stable textual signature of the layout.
    #[must_use]
    pub fn signature(&self) -> String {
        format!(
            "columns[{}] unique[{}] time[{}] dedup[{}]",
            render_columns(&self.columns),
            self.unique_key.join(","),
            self.time_column.as_deref().unwrap_or(""),
            match self.dedup_mode {
                DedupMode::None => String::from("none"),
                DedupMode::Replacing => {
                    format!("replacing:{}", self.dedup_version_column.as_deref().unwrap_or(""))
                }
            }
        )
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates a dataset or column identifier.
///
/// # Errors
///
/// Returns [`SchemaError::Invalid`] when the identifier is empty, too long, or
/// contains characters outside `[a-z0-9_]` (leading digit rejected).
pub fn validate_identifier(kind: &str, value: &str) -> Result<(), SchemaError> {
    if value.is_empty() {
        return Err(SchemaError::Invalid(format!("{kind} name must be non-empty")));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SchemaError::Invalid(format!("{kind} name exceeds length limit: {value}")));
    }
    let mut chars = value.chars();
    let leading_ok = chars.next().is_some_and(|ch| ch.is_ascii_lowercase() || ch == '_');
    let rest_ok = chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
    if !leading_ok || !rest_ok {
        return Err(SchemaError::Invalid(format!("{kind} name has invalid characters: {value}")));
    }
    Ok(())
}

/// Parses a list of column specs.
fn parse_columns(specs: &[&str]) -> Result<Vec<ColumnSpec>, SchemaError> {
    specs.iter().map(|spec| ColumnSpec::parse(spec)).collect()
}

/// Renders columns as `name:TYPE` joined by commas.
fn render_columns(columns: &[ColumnSpec]) -> String {
    columns
        .iter()
        .map(|column| format!("{}:{}", column.name, column.column_type.label()))
        .collect::<Vec<_>>()
        .join(",")
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
    fn identifier_rejects_sql_metacharacters() {
        assert!(validate_identifier("column", "code").is_ok());
        assert!(validate_identifier("column", "_hidden_2").is_ok());
        assert!(validate_identifier("column", "2fast").is_err());
        assert!(validate_identifier("column", "drop;table").is_err());
        assert!(validate_identifier("column", "Code").is_err());
        assert!(validate_identifier("column", &"a".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn coerce_widens_and_rejects() {
        assert_eq!(ColumnType::Double.coerce("x", Value::Int(2)).unwrap(), Value::Float(2.0));
        assert_eq!(ColumnType::Boolean.coerce("x", Value::Int(1)).unwrap(), Value::Bool(true));
        assert_eq!(ColumnType::Text.coerce("x", Value::Null).unwrap(), Value::Null);
        let err = ColumnType::Integer.coerce("x", Value::Text("1".to_string())).unwrap_err();
        assert_eq!(
            err,
            SchemaError::Type {
                column: "x".to_string(),
                expected: "INTEGER",
                actual: "text",
            }
        );
    }
}
