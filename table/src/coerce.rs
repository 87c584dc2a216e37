//! Value-to-column coercion (§4.4 step 3). `NULL` is handled by the
//! caller via `Column::nullable`; everything here assumes a non-null
//! value arriving for a specific declared column type.

use common::{Column, ColumnType, Value};

use crate::TableError;

/// Coerces `value` into the representation `column` expects to store,
/// or reports why it can't.
///
/// Open-question decision: numeric columns widen freely in the safe
/// direction (`Integer` -> `Long` -> `Real`) but never narrow silently —
/// a `Long` that doesn't fit in `i32` is a type mismatch against an
/// `Integer` column rather than a truncating cast. `Text` columns accept
/// any value kind via its canonical string form, since `DateTime` and
/// `Decimal` literals (§4.5) have nowhere else to land once parsed.
pub fn coerce_value(value: &Value, column: &Column) -> Result<Value, TableError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match (column.column_type, value) {
        (ColumnType::Integer, Value::Integer(_)) => Ok(value.clone()),
        (ColumnType::Integer, Value::Long(v)) => i32::try_from(*v)
            .map(Value::Integer)
            .map_err(|_| type_mismatch(column, value)),

        (ColumnType::Long, Value::Long(_)) => Ok(value.clone()),
        (ColumnType::Long, Value::Integer(v)) => Ok(Value::Long(*v as i64)),

        (ColumnType::Real, Value::Real(_)) => Ok(value.clone()),
        (ColumnType::Real, Value::Integer(v)) => Ok(Value::Real(*v as f64)),
        (ColumnType::Real, Value::Long(v)) => Ok(Value::Real(*v as f64)),
        (ColumnType::Real, Value::Decimal(d)) => d
            .to_string()
            .parse::<f64>()
            .map(Value::Real)
            .map_err(|_| type_mismatch(column, value)),

        (ColumnType::Text, Value::Text(_)) => Ok(value.clone()),
        (ColumnType::Text, _) => Ok(Value::Text(value.canonical_string())),

        _ => Err(type_mismatch(column, value)),
    }
}

fn type_mismatch(column: &Column, value: &Value) -> TableError {
    TableError::TypeMismatch {
        column: column.name.clone(),
        expected: column.column_type.to_string(),
        found: value.kind_name().to_string(),
    }
}
