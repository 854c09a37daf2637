//! SQL value and row representation.
//!
//! Drivers hand rows back with native decimal and temporal types. Every row
//! that leaves a client goes through [`Row::encoded`], which turns decimals
//! into floats and timestamps into `YYYY-MM-DD HH:MM:SS` strings so that the
//! result serializes cleanly.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Format used for timestamps by the input-encoding rule.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

/// A SQL value that can cross the driver boundary in either direction.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Arbitrary-precision decimal (DECIMAL, NUMERIC).
    Decimal(Decimal),
    /// Character data.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without time zone (DATETIME, TIMESTAMP).
    DateTime(NaiveDateTime),
}

impl Value {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a bool, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::Int(v) => Some(*v != 0),
            Self::UInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Get the value as an i64, if it fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Get the value as a u64, if it fits.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Get the value as an f64, converting integers and decimals.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Decimal(v) => v.to_f64(),
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get the value as a decimal, if it is one.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(v) => Some(*v),
            Self::Int(v) => Some(Decimal::from(*v)),
            Self::UInt(v) => Some(Decimal::from(*v)),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as bytes, if it is binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            Self::Text(v) => Some(v.as_bytes()),
            _ => None,
        }
    }

    /// Get the type name as a string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOLEAN",
            Self::Int(_) => "BIGINT",
            Self::UInt(_) => "BIGINT UNSIGNED",
            Self::Float(_) => "DOUBLE",
            Self::Decimal(_) => "DECIMAL",
            Self::Text(_) => "TEXT",
            Self::Bytes(_) => "BLOB",
            Self::Date(_) => "DATE",
            Self::Time(_) => "TIME",
            Self::DateTime(_) => "DATETIME",
        }
    }

    /// Apply the input-encoding rule to a single value.
    ///
    /// Decimals become floats and timestamps become
    /// [`DATETIME_FORMAT`] strings; everything else passes through.
    #[must_use]
    pub fn encoded(self) -> Self {
        match self {
            Self::Decimal(v) => v.to_f64().map_or_else(|| Self::Text(v.to_string()), Self::Float),
            Self::DateTime(v) => Self::Text(v.format(DATETIME_FORMAT).to_string()),
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Date(v) => write!(f, "'{}'", v.format(DATE_FORMAT)),
            Self::Time(v) => write!(f, "'{}'", v.format(TIME_FORMAT)),
            Self::DateTime(v) => write!(f, "'{}'", v.format(DATETIME_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::UInt(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Decimal(v) => serializer.collect_str(v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Bytes(v) => serializer.serialize_bytes(v),
            Self::Date(v) => serializer.collect_str(&v.format(DATE_FORMAT)),
            Self::Time(v) => serializer.collect_str(&v.format(TIME_FORMAT)),
            Self::DateTime(v) => serializer.collect_str(&v.format(DATETIME_FORMAT)),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(<$target>::from(v))
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => Text as String,
    &str => Text as String,
    Vec<u8> => Bytes as Vec<u8>,
    &[u8] => Bytes as Vec<u8>,
    Decimal => Decimal as Decimal,
    NaiveDate => Date as NaiveDate,
    NaiveTime => Time as NaiveTime,
    NaiveDateTime => DateTime as NaiveDateTime,
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// Build a `Vec<Value>` of statement arguments.
///
/// ```rust
/// use unitpool::{Value, params};
///
/// let args = params![100, "alice", None::<i32>];
/// assert_eq!(args[0], Value::Int(100));
/// assert!(args[2].is_null());
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

/// One result row: an ordered field-name to value mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from shared column names and values.
    ///
    /// Missing trailing values are filled with NULL, extra values are dropped.
    pub fn new(columns: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    /// Column names in result order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in result order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i))
    }

    /// Get a value by position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Iterate over `(name, value)` pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Apply the input-encoding rule to every field.
    #[must_use]
    pub fn encoded(self) -> Self {
        Self {
            columns: self.columns,
            values: self.values.into_iter().map(Value::encoded).collect(),
        }
    }

    /// Convert into owned `(name, value)` pairs.
    #[must_use]
    pub fn into_map(self) -> Vec<(String, Value)> {
        self.columns.iter().cloned().zip(self.values).collect()
    }
}

impl Index<&str> for Row {
    type Output = Value;

    /// Returns [`Value::Null`] for unknown field names.
    fn index(&self, name: &str) -> &Self::Output {
        const NULL: &Value = &Value::Null;
        self.get(name).unwrap_or(NULL)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn columns(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_encoding_decimal_and_datetime() {
        let at = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap();
        let row = Row::new(
            columns(&["price", "created_at", "name"]),
            vec![
                Value::Decimal(Decimal::from_str("10.99").unwrap()),
                Value::DateTime(at),
                Value::from("book"),
            ],
        )
        .encoded();

        assert_eq!(row["price"], Value::Float(10.99));
        assert_eq!(row["created_at"], Value::Text("2023-01-01 12:30:45".into()));
        assert_eq!(row["name"], Value::Text("book".into()));
    }

    #[test]
    fn test_encoding_leaves_dates_and_ints() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Value::Date(day).encoded(), Value::Date(day));
        assert_eq!(Value::Int(7).encoded(), Value::Int(7));
        assert_eq!(Value::Null.encoded(), Value::Null);
    }

    #[test]
    fn test_row_lookup() {
        let row = Row::new(columns(&["id", "name"]), vec![Value::Int(1)]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get("name"), Some(&Value::Null));
        assert_eq!(row.get("missing"), None);
        assert!(row["missing"].is_null());
        assert_eq!(row.get_index(0), Some(&Value::Int(1)));
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new(
            columns(&["id", "balance", "note"]),
            vec![Value::Int(1), Value::Float(900.0), Value::Null],
        );
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":1,"balance":900.0,"note":null}"#);
    }

    #[test]
    fn test_params_macro() {
        let args = params![1u8, -2i32, "x", 1.5f64, None::<i64>];
        assert_eq!(
            args,
            vec![
                Value::UInt(1),
                Value::Int(-2),
                Value::Text("x".into()),
                Value::Float(1.5),
                Value::Null,
            ]
        );
        assert!(params![].is_empty());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::UInt(5).as_i64(), Some(5));
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Int(1).as_bool(), Some(true));
        assert_eq!(
            Value::Decimal(Decimal::from_str("2.5").unwrap()).as_f64(),
            Some(2.5)
        );
        assert_eq!(Value::from("a'b").to_string(), "'a''b'");
    }
}
