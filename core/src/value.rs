//! Value types for entgraph fields.
//!
//! Values are the atomic data carried by entity fields, ids, predicate
//! arguments and query rows. `FieldType` is the semantic tag a schema field
//! declares; it decides which runtime values a field accepts and how raw store
//! values are scanned back into semantic ones.

use std::fmt;
use thiserror::Error;

/// A value that can be stored in a field or passed as a statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null/missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string (also carries enum members).
    String(String),
    /// Time as milliseconds since Unix epoch.
    Time(i64),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Arbitrary JSON document.
    Json(serde_json::Value),
}

impl Value {
    /// Returns true if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for Int and Float values.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float, widening Int values.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<i64> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Time(_) => "Time",
            Value::Bytes(_) => "Bytes",
            Value::Json(_) => "Json",
        }
    }

    /// Numeric sum used when accumulating deltas. Int + Int stays Int,
    /// any Float operand widens the result. Non-numeric operands yield None.
    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                Some(Value::Float(a.as_float()? + b.as_float()?))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Time(t) => write!(f, "time:{}", t),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Errors raised while converting raw store values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValueError {
    #[error("cannot scan {actual} into a {expected} field")]
    Scan {
        expected: FieldType,
        actual: &'static str,
    },

    #[error("invalid json value: {0}")]
    Json(String),
}

/// Semantic type tag of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    Time,
    Bytes,
    Enum,
    Json,
}

impl FieldType {
    /// Returns the type name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Bool => "Bool",
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::String => "String",
            FieldType::Time => "Time",
            FieldType::Bytes => "Bytes",
            FieldType::Enum => "Enum",
            FieldType::Json => "Json",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }

    /// Check whether a runtime value may be written to a field of this type.
    /// Null is accepted by every type; nullability is checked separately.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (FieldType::Bool, Value::Bool(_))
                | (FieldType::Int, Value::Int(_))
                | (FieldType::Float, Value::Float(_) | Value::Int(_))
                | (FieldType::String | FieldType::Enum, Value::String(_))
                | (FieldType::Time, Value::Time(_) | Value::Int(_))
                | (FieldType::Bytes, Value::Bytes(_))
                | (FieldType::Json, Value::Json(_))
        )
    }

    /// Normalize an accepted value to this type's canonical variant
    /// (Int widened for Float fields, Int tagged as Time for Time fields).
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (FieldType::Float, Value::Int(i)) => Value::Float(i as f64),
            (FieldType::Time, Value::Int(i)) => Value::Time(i),
            (_, v) => v,
        }
    }

    /// Scan a raw value returned by a store into this type's semantic value.
    pub fn decode(&self, raw: Value) -> Result<Value, ValueError> {
        let actual = raw.type_name();
        match (self, raw) {
            (_, Value::Null) => Ok(Value::Null),
            (FieldType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (FieldType::Bool, Value::Int(i)) => Ok(Value::Bool(i != 0)),
            (FieldType::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (FieldType::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (FieldType::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (FieldType::String | FieldType::Enum, Value::String(s)) => Ok(Value::String(s)),
            (FieldType::Time, Value::Time(t) | Value::Int(t)) => Ok(Value::Time(t)),
            (FieldType::Bytes, Value::Bytes(b)) => Ok(Value::Bytes(b)),
            (FieldType::Bytes, Value::String(s)) => Ok(Value::Bytes(s.into_bytes())),
            (FieldType::Json, Value::Json(j)) => Ok(Value::Json(j)),
            (FieldType::Json, Value::String(s)) => serde_json::from_str(&s)
                .map(Value::Json)
                .map_err(|e| ValueError::Json(e.to_string())),
            (FieldType::Json, Value::Bytes(b)) => serde_json::from_slice(&b)
                .map(Value::Json)
                .map_err(|e| ValueError::Json(e.to_string())),
            _ => Err(ValueError::Scan {
                expected: *self,
                actual,
            }),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered row of column/value pairs returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from parallel column and value lists.
    pub fn from_parts(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Set a column, replacing any previous value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.columns.iter().position(|c| *c == column) {
            Some(i) => self.values[i] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Remove a column, returning its value.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        let i = self.columns.iter().position(|c| c == column)?;
        self.columns.remove(i);
        Some(self.values.remove(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// Helper macro to create records.
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        {
            let mut record = $crate::Record::new();
            $(
                record.insert($key, $crate::Value::from($value));
            )+
            record
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_accepts() {
        assert!(FieldType::Float.accepts(&Value::Int(1)));
        assert!(FieldType::Time.accepts(&Value::Int(1)));
        assert!(FieldType::Enum.accepts(&Value::from("admin")));
        assert!(FieldType::Bytes.accepts(&Value::Null));
        assert!(!FieldType::Int.accepts(&Value::from("1")));
        assert!(!FieldType::Bool.accepts(&Value::Int(1)));
    }

    #[test]
    fn test_coerce_normalizes_variants() {
        assert_eq!(FieldType::Float.coerce(Value::Int(3)), Value::Float(3.0));
        assert_eq!(FieldType::Time.coerce(Value::Int(10)), Value::Time(10));
        assert_eq!(FieldType::Int.coerce(Value::Int(10)), Value::Int(10));
    }

    #[test]
    fn test_decode_raw_store_values() {
        // GIVEN raw values as a store without bool/time/json columns returns them
        let flag = Value::Int(1);
        let created = Value::Int(1_700_000_000_000);
        let doc = Value::from(r#"{"a":1}"#);

        // WHEN
        let flag = FieldType::Bool.decode(flag);
        let created = FieldType::Time.decode(created);
        let doc = FieldType::Json.decode(doc);

        // THEN
        assert_eq!(flag, Ok(Value::Bool(true)));
        assert_eq!(created, Ok(Value::Time(1_700_000_000_000)));
        assert_eq!(doc, Ok(Value::Json(serde_json::json!({"a": 1}))));
    }

    #[test]
    fn test_decode_rejects_incompatible_value() {
        let result = FieldType::Int.decode(Value::from("ten"));
        assert_eq!(
            result,
            Err(ValueError::Scan {
                expected: FieldType::Int,
                actual: "String"
            })
        );
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(Value::Int(2).checked_add(&Value::Int(3)), Some(Value::Int(5)));
        assert_eq!(
            Value::Int(2).checked_add(&Value::Float(0.5)),
            Some(Value::Float(2.5))
        );
        assert_eq!(Value::from("a").checked_add(&Value::Int(1)), None);
    }

    #[test]
    fn test_record_macro_and_insert() {
        let mut record = record! {
            "id" => 1i64,
            "name" => "a8m",
        };
        record.insert("name", Value::from("nati"));

        assert_eq!(record.columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(record.get("name"), Some(&Value::from("nati")));
        assert_eq!(record.take("id"), Some(Value::Int(1)));
        assert_eq!(record.len(), 1);
    }
}
