use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::datetime::canonical_datetime_string;

/// A 128-bit, base-10 exact numeric, reusing `rust_decimal`'s in-memory
/// layout (four `u32` limbs: scale+sign flags, then a 96-bit significand)
/// instead of hand-rolling 128-bit fixed point arithmetic.
pub type Decimal128 = Decimal;

/// The four declarable column types of the dialect (§3). `DateTime` and
/// `Decimal` are *value* kinds produced by literal parsing (§4.5) but are
/// never a column's declared type in this dialect — they always end up
/// coerced into one of the four variants below before being stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Long,
    Text,
    Real,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Long => "LONG",
            ColumnType::Text => "TEXT",
            ColumnType::Real => "REAL",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ColumnType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INTEGER" => Ok(ColumnType::Integer),
            "LONG" => Ok(ColumnType::Long),
            "TEXT" => Ok(ColumnType::Text),
            "REAL" => Ok(ColumnType::Real),
            _ => Err(()),
        }
    }
}

/// A single typed field value. `Null` is untyped — it is compatible with
/// every column. `DateTime`/`Decimal` are intermediate literal kinds (§4.5)
/// that always coerce into a declared column type before storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i32),
    Long(i64),
    Real(f64),
    Text(String),
    /// Ticks (100ns units) since `0001-01-01T00:00:00Z`.
    DateTime(i64),
    Decimal(Decimal128),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column-family marker this value would use on the wire if it
    /// were the declared type of a column, for diagnostics only.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Long(_) => "LONG",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::DateTime(_) => "DATETIME",
            Value::Decimal(_) => "DECIMAL",
        }
    }

    /// Canonical string form, used both for coercion into Text columns and
    /// for string-ordinal comparison fallback (§4.6 rule 3).
    pub fn canonical_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Real(v) => format!("{v}"),
            Value::Text(v) => v.clone(),
            Value::DateTime(ticks) => canonical_datetime_string(*ticks),
            Value::Decimal(d) => d.to_string(),
        }
    }

    /// UTF-16 code unit count of the canonical string form; `NULL` is 0
    /// (§4.6, `LEN(col)`).
    pub fn len_utf16(&self) -> i64 {
        if self.is_null() {
            return 0;
        }
        self.canonical_string().encode_utf16().count() as i64
    }

    fn numeric_value(&self) -> Option<Decimal128> {
        match self {
            Value::Integer(v) => Some(Decimal128::from(*v)),
            Value::Long(v) => Some(Decimal128::from(*v)),
            Value::Real(v) => Decimal128::from_f64_retain(*v),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Integer(_) | Value::Long(_) | Value::Real(_) | Value::Decimal(_)
        )
    }

    /// Implements §4.6's three-tier comparison: null handling by the
    /// caller, then numeric promotion via `Decimal`, then case-insensitive
    /// ordinal string comparison.
    pub fn compare(&self, other: &Value) -> ValueOrdering {
        if self.is_numeric() && other.is_numeric() {
            if let (Some(a), Some(b)) = (self.numeric_value(), other.numeric_value()) {
                return ValueOrdering::Ordered(a.cmp(&b));
            }
        }
        let a = self.canonical_string().to_ascii_lowercase();
        let b = other.canonical_string().to_ascii_lowercase();
        ValueOrdering::Ordered(a.cmp(&b))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            Value::Decimal(d) => d.to_i64(),
            _ => None,
        }
    }
}

/// Result of comparing two values; kept distinct from `std::cmp::Ordering`
/// so null-handling call sites (§4.6 rule 1) can't accidentally treat an
/// "incomparable" case as an ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueOrdering {
    Ordered(Ordering),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => matches!(self.compare(other), ValueOrdering::Ordered(Ordering::Equal)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_promotion_compares_int_and_real() {
        let a = Value::Integer(5);
        let b = Value::Real(5.0);
        assert_eq!(a, b);
    }

    #[test]
    fn text_comparison_is_case_insensitive() {
        let a = Value::Text("Hello".into());
        let b = Value::Text("hello".into());
        assert_eq!(a, b);
    }

    #[test]
    fn len_utf16_counts_null_as_zero() {
        assert_eq!(Value::Null.len_utf16(), 0);
        assert_eq!(Value::Text("hi".into()).len_utf16(), 2);
    }
}
