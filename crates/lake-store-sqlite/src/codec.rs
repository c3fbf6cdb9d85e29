// crates/lake-store-sqlite/src/codec.rs
// ============================================================================
// Module: SQLite Value Codec
// Description: Conversions between lake values and SQLite storage classes.
// Purpose: Bind row values as parameters and decode stored cells by type.
// Dependencies: lake-core, rusqlite
// ============================================================================

//! ## Overview
//! Booleans are stored as `0`/`1` integers and timestamps as unix
//! milliseconds, so decoding needs the declared [`ColumnType`] to recover
//! the original [`Value`] variant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use lake_core::ColumnSpec;
use lake_core::ColumnType;
use lake_core::Value;
use rusqlite::types::Value as SqlValue;
use rusqlite::types::ValueRef;

use crate::warehouse::WarehouseError;

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Converts a value into an owned `SQLite` parameter.
pub(crate) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Int(number) => SqlValue::Integer(*number),
        Value::Float(number) => SqlValue::Real(*number),
        Value::Text(text) => SqlValue::Text(text.clone()),
    }
}

/// Coerces a producer row into declared column types.
///
/// `key_columns` leading columns must be non-null.
pub(crate) fn coerce_row(
    columns: &[&ColumnSpec],
    key_columns: usize,
    index: usize,
    values: Vec<Value>,
) -> Result<Vec<Value>, WarehouseError> {
    if values.len() != columns.len() {
        return Err(WarehouseError::RowShape {
            index,
            actual: values.len(),
            expected: columns.len(),
        });
    }
    let mut coerced = Vec::with_capacity(values.len());
    for (position, (column, value)) in columns.iter().zip(values).enumerate() {
        let value = column.column_type.coerce(&column.name, value)?;
        if position < key_columns && value.is_null() {
            return Err(WarehouseError::Schema(format!(
                "row {index} has null primary key column {}",
                column.name
            )));
        }
        coerced.push(value);
    }
    Ok(coerced)
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a stored cell using the declared column type.
#[allow(clippy::cast_precision_loss, reason = "Integer cells widen into double columns.")]
pub(crate) fn decode_value(column: &ColumnSpec, raw: ValueRef<'_>) -> Result<Value, WarehouseError> {
    match (column.column_type, raw) {
        (_, ValueRef::Null) => Ok(Value::Null),
        (ColumnType::Text, ValueRef::Text(bytes)) => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|_| corrupt(column, "non-UTF-8 text")),
        (ColumnType::Integer | ColumnType::Timestamp, ValueRef::Integer(number)) => {
            Ok(Value::Int(number))
        }
        (ColumnType::Double, ValueRef::Real(number)) => Ok(Value::Float(number)),
        (ColumnType::Double, ValueRef::Integer(number)) => Ok(Value::Float(number as f64)),
        (ColumnType::Boolean, ValueRef::Integer(0)) => Ok(Value::Bool(false)),
        (ColumnType::Boolean, ValueRef::Integer(1)) => Ok(Value::Bool(true)),
        (_, other) => Err(corrupt(column, other.data_type().to_string().as_str())),
    }
}

/// Builds a corruption error for a column.
fn corrupt(column: &ColumnSpec, found: &str) -> WarehouseError {
    WarehouseError::Corrupt(format!(
        "column {} ({}) holds unexpected {found}",
        column.name,
        column.column_type.label()
    ))
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

    fn spec(name: &str, column_type: ColumnType) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            column_type,
        }
    }

    #[test]
    fn booleans_round_trip_through_integers() {
        let column = spec("flag", ColumnType::Boolean);
        let SqlValue::Integer(stored) = to_sql_value(&Value::Bool(true)) else {
            panic!("boolean must encode as integer");
        };
        assert_eq!(decode_value(&column, ValueRef::Integer(stored)).unwrap(), Value::Bool(true));
        assert!(matches!(
            decode_value(&column, ValueRef::Integer(7)),
            Err(WarehouseError::Corrupt(_))
        ));
    }

    #[test]
    fn coerce_row_rejects_shape_and_null_keys() {
        let pk = spec("pk", ColumnType::Text);
        let code = spec("code", ColumnType::Text);
        let columns = [&pk, &code];
        let err = coerce_row(&columns, 1, 3, vec![Value::from("a")]).unwrap_err();
        assert_eq!(err.to_string(), "row 3 has 1 columns, expected exactly 2");
        let err = coerce_row(&columns, 1, 0, vec![Value::Null, Value::from("x")]).unwrap_err();
        assert!(matches!(err, WarehouseError::Schema(_)));
        let row = coerce_row(&columns, 1, 0, vec![Value::from("a"), Value::Null]).unwrap();
        assert_eq!(row, vec![Value::from("a"), Value::Null]);
    }
}
