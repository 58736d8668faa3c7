//! Scalar store values and plain key-value payload maps.
//!
//! # Responsibility
//! - Define the one scalar value shape that crosses the persistence
//!   boundary in both directions.
//! - Convert between JSON payload values and SQLite parameter values.
//!
//! # Invariants
//! - Only scalars are persistable; JSON arrays/objects never reach SQL.
//! - JSON booleans are stored as integers 0/1.

use rusqlite::types::{Null, ToSqlOutput, Value as SqlValue};
use rusqlite::ToSql;
use serde_json::{Number, Value};

/// Plain key-value payload exchanged with collaborators (create/update
/// input, validation input, import/export maps).
pub type DataMap = serde_json::Map<String, Value>;

/// One scalar column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    /// Converts a JSON payload value to a scalar, or `None` when the value
    /// has no scalar representation (arrays, objects).
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(flag) => Some(Self::Integer(i64::from(*flag))),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Some(Self::Integer(int))
                } else {
                    number.as_f64().map(Self::Real)
                }
            }
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Converts back into a JSON payload value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(int) => Value::Number(Number::from(*int)),
            Self::Real(real) => Number::from_f64(*real).map_or(Value::Null, Value::Number),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(int) => Some(*int),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

impl From<SqlValue> for FieldValue {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Integer(int) => Self::Integer(int),
            SqlValue::Real(real) => Self::Real(real),
            SqlValue::Text(text) => Self::Text(text),
            // This schema declares no blob columns; an unexpected blob reads
            // back as NULL rather than corrupting a scalar column.
            SqlValue::Blob(_) => Self::Null,
        }
    }
}

impl From<&FieldValue> for SqlValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Null => SqlValue::Null,
            FieldValue::Integer(int) => SqlValue::Integer(*int),
            FieldValue::Real(real) => SqlValue::Real(*real),
            FieldValue::Text(text) => SqlValue::Text(text.clone()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::from(Null),
            Self::Integer(int) => ToSqlOutput::from(*int),
            Self::Real(real) => ToSqlOutput::from(*real),
            Self::Text(text) => ToSqlOutput::from(text.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FieldValue;
    use serde_json::json;

    #[test]
    fn json_scalars_convert_both_ways() {
        assert_eq!(FieldValue::from_json(&json!(null)), Some(FieldValue::Null));
        assert_eq!(
            FieldValue::from_json(&json!(42)),
            Some(FieldValue::Integer(42))
        );
        assert_eq!(
            FieldValue::from_json(&json!(2.5)),
            Some(FieldValue::Real(2.5))
        );
        assert_eq!(
            FieldValue::from_json(&json!("age")),
            Some(FieldValue::Text("age".to_string()))
        );
        assert_eq!(
            FieldValue::from_json(&json!(true)),
            Some(FieldValue::Integer(1))
        );

        assert_eq!(FieldValue::Integer(42).to_json(), json!(42));
        assert_eq!(FieldValue::Text("age".to_string()).to_json(), json!("age"));
    }

    #[test]
    fn compound_json_values_are_not_scalars() {
        assert_eq!(FieldValue::from_json(&json!([1, 2])), None);
        assert_eq!(FieldValue::from_json(&json!({"a": 1})), None);
    }
}
