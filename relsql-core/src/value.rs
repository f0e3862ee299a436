//! SQL values exchanged between records, compiled statements and the cache.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{SqlError, SqlResult};

/// A single SQL value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
    /// Only bindable on dialects with array parameters
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or numeric zero. Key components in this state count as unset.
    pub fn is_unset(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Integer(i) => *i == 0,
            Value::Real(f) => *f == 0.0,
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
        }
    }

    /// Converts a nullable column value, mapping `Null` to `None`.
    pub fn optional<T>(self) -> SqlResult<Option<T>>
    where
        T: TryFrom<Value, Error = SqlError>,
    {
        match self {
            Value::Null => Ok(None),
            other => T::try_from(other).map(Some),
        }
    }

    fn mismatch(expected: &'static str, found: &Value) -> SqlError {
        SqlError::TypeMismatch {
            expected,
            found: format!("{:?}", found),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Real(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Blob(b) => b.hash(state),
            Value::Timestamp(t) => t.hash(state),
            Value::Array(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl TryFrom<Value> for i64 {
    type Error = SqlError;

    fn try_from(value: Value) -> SqlResult<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            Value::Bool(b) => Ok(b as i64),
            other => Err(Value::mismatch("integer", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = SqlError;

    fn try_from(value: Value) -> SqlResult<Self> {
        match value {
            Value::Real(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => Err(Value::mismatch("real", &other)),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = SqlError;

    fn try_from(value: Value) -> SqlResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            // SQLite and MySQL hand booleans back as integers
            Value::Integer(i) => Ok(i != 0),
            other => Err(Value::mismatch("bool", &other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = SqlError;

    fn try_from(value: Value) -> SqlResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(Value::mismatch("text", &other)),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = SqlError;

    fn try_from(value: Value) -> SqlResult<Self> {
        match value {
            Value::Blob(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(Value::mismatch("blob", &other)),
        }
    }
}

impl TryFrom<Value> for DateTime<Utc> {
    type Error = SqlError;

    fn try_from(value: Value) -> SqlResult<Self> {
        match value {
            Value::Timestamp(t) => Ok(t),
            Value::Text(ref s) => {
                if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                    return Ok(t.with_timezone(&Utc));
                }
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .map(|naive| naive.and_utc())
                    .map_err(|_| Value::mismatch("timestamp", &value))
            }
            Value::Integer(secs) => DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| Value::mismatch("timestamp", &Value::Integer(secs))),
            other => Err(Value::mismatch("timestamp", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unset_values() {
        assert!(Value::Null.is_unset());
        assert!(Value::Integer(0).is_unset());
        assert!(Value::Real(0.0).is_unset());
        assert!(!Value::Integer(5).is_unset());
        assert!(!Value::Text(String::new()).is_unset());
        assert!(!Value::Bool(false).is_unset());
    }

    #[test]
    fn test_structural_hash() {
        let mut set = HashSet::new();
        set.insert(Value::Integer(1));
        set.insert(Value::Integer(1));
        set.insert(Value::Real(1.0));
        set.insert(Value::Text("1".to_string()));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_conversions() {
        let v: i64 = Value::Integer(42).try_into().unwrap();
        assert_eq!(v, 42);

        let b: bool = Value::Integer(1).try_into().unwrap();
        assert!(b);

        let s: Option<String> = Value::Null.optional().unwrap();
        assert_eq!(s, None);

        let err = i64::try_from(Value::Text("x".to_string())).unwrap_err();
        assert!(matches!(err, SqlError::TypeMismatch { expected: "integer", .. }));
    }

    #[test]
    fn test_timestamp_from_text() {
        let t: DateTime<Utc> = Value::Text("2024-03-01 12:30:00".to_string())
            .try_into()
            .unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-01T12:30:00+00:00");

        let t: DateTime<Utc> = Value::Text("2024-03-01T12:30:00.000Z".to_string())
            .try_into()
            .unwrap();
        assert_eq!(t.timestamp(), 1709296200);
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".to_string()));
    }

    #[test]
    fn test_serde_roundtrip_keeps_variant() {
        let v = Value::Array(vec![Value::Integer(1), Value::Text("a".to_string())]);
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
