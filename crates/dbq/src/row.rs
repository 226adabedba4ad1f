//! Row access and mapping.

use crate::error::{DbError, DbResult};
use crate::value::Value;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// One result row. Column names are shared by all rows of a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of a column by name.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    pub fn get_idx(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Typed value of a column; a missing column or a mismatching value is a
    /// [`DbError::Decode`].
    pub fn get<T: FromValue>(&self, column: &str) -> DbResult<T> {
        let value = self
            .get_value(column)
            .ok_or_else(|| DbError::decode(column, "no such column"))?;
        T::from_value(value).map_err(|message| DbError::decode(column, message))
    }

    pub fn get_at<T: FromValue>(&self, idx: usize) -> DbResult<T> {
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| DbError::decode(idx.to_string(), "column index out of range"))?;
        T::from_value(value).map_err(|message| DbError::decode(idx.to_string(), message))
    }

    /// Column name → value map in column order.
    pub fn to_map(&self) -> IndexMap<String, Value> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }

    /// Deserialize the row into any serde type, column names as field names.
    ///
    /// ```ignore
    /// #[derive(serde::Deserialize)]
    /// struct User { id: i64, name: String }
    ///
    /// let user: User = row.deserialize()?;
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> DbResult<T> {
        let object = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| DbError::decode("*", e.to_string()))
    }
}

/// Conversion from a fetched [`Value`].
///
/// Drivers hand back loosely typed values (MySQL returns most columns as
/// text), so numeric targets also accept numeric text.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {expected}, found {value:?}")
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        value.as_i64().ok_or_else(|| mismatch("integer", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let n = i64::from_value(value)?;
        i32::try_from(n).map_err(|_| format!("{n} out of range for i32"))
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let n = i64::from_value(value)?;
        u64::try_from(n).map_err(|_| format!("{n} out of range for u64"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        value.as_f64().ok_or_else(|| mismatch("number", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Text(s) => match s.as_str() {
                "1" | "t" | "true" => Ok(true),
                "0" | "f" | "false" => Ok(false),
                _ => Err(mismatch("boolean", value)),
            },
            _ => Err(mismatch("boolean", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Err(mismatch("text", value)),
            other => Ok(other.key_string()),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        let text = value.as_str().ok_or_else(|| mismatch("uuid", value))?;
        uuid::Uuid::parse_str(text).map_err(|e| e.to_string())
    }
}

impl FromValue for chrono::NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, String> {
        let text = value.as_str().ok_or_else(|| mismatch("datetime", value))?;
        chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
            .map_err(|e| e.to_string())
    }
}

impl FromValue for chrono::NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        let text = value.as_str().ok_or_else(|| mismatch("date", value))?;
        chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| e.to_string())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Trait for types that can be constructed from a [`Row`].
///
/// # Example
///
/// ```ignore
/// use dbq::{FromRow, Row, DbResult};
///
/// struct User {
///     id: i64,
///     email: Option<String>,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> DbResult<Self> {
///         Ok(Self { id: row.get("id")?, email: row.get("email")? })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> DbResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new(
            Arc::from(vec!["id".to_string(), "name".to_string(), "email".to_string()]),
            vec![Value::Text("7".into()), Value::Text("ann".into()), Value::Null],
        )
    }

    #[test]
    fn typed_access() {
        let row = row();
        assert_eq!(row.get::<i64>("id").unwrap(), 7);
        assert_eq!(row.get::<String>("name").unwrap(), "ann");
        assert_eq!(row.get::<Option<String>>("email").unwrap(), None);
        assert!(matches!(row.get::<i64>("missing"), Err(DbError::Decode { .. })));
        assert!(row.get::<i64>("name").is_err());
    }

    #[test]
    fn deserializes_into_struct() {
        #[derive(serde::Deserialize)]
        struct User {
            name: String,
            email: Option<String>,
        }
        let user: User = row().deserialize().unwrap();
        assert_eq!(user.name, "ann");
        assert!(user.email.is_none());
    }

    #[test]
    fn map_keeps_column_order() {
        let keys: Vec<_> = row().to_map().keys().cloned().collect();
        assert_eq!(keys, ["id", "name", "email"]);
    }
}
