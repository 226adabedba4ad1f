//! Bound values and their SQL encoding.
//!
//! [`Value`] is the closed set of things that may appear on the right-hand
//! side of a condition, in an assignment or in an insert row. How a value is
//! encoded decides whether it ends up inline in the SQL text or as a bind
//! argument:
//!
//! | variant | rendering |
//! |---------|-----------|
//! | `Null` | `NULL` |
//! | `Bool` | `'1'` / `'0'` |
//! | `Int`, `Float` | bare number, or `'n'` when quoting numerics |
//! | `Text` | bind placeholder (`?` / `$n`) |
//! | `Raw` | verbatim SQL |
//!
//! Text never reaches the SQL string; that is the injection boundary.
//! [`Value::Raw`] bypasses it and must only carry trusted SQL.

use crate::error::{DbError, DbResult};
use std::fmt;

/// A value bound into a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Trusted SQL inserted verbatim (e.g. `NOW()`).
    Raw(String),
}

/// Result of encoding one [`Value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    /// Inline SQL text.
    Literal(String),
    /// The value must be sent as a bind argument.
    Bind,
}

/// Encode a value for inclusion in SQL text.
///
/// `always_quote` wraps numerics in single quotes so that comparisons against
/// textual columns can still use their indexes.
pub fn encode(value: &Value, always_quote: bool) -> Encoded {
    match value {
        Value::Null => Encoded::Literal("NULL".to_string()),
        Value::Bool(b) => Encoded::Literal(if *b { "'1'" } else { "'0'" }.to_string()),
        Value::Int(n) => Encoded::Literal(numeric_literal(&n.to_string(), always_quote)),
        Value::Float(f) if !f.is_finite() => Encoded::Literal(format!("'{}'", float_text(*f))),
        Value::Float(f) => Encoded::Literal(numeric_literal(&float_text(*f), always_quote)),
        Value::Text(_) => Encoded::Bind,
        Value::Raw(sql) => Encoded::Literal(sql.clone()),
    }
}

fn numeric_literal(text: &str, always_quote: bool) -> String {
    if always_quote {
        format!("'{text}'")
    } else {
        text.to_string()
    }
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        f.to_string()
    }
}

impl Value {
    /// Wrap trusted SQL so it is inserted verbatim.
    ///
    /// **Never** pass user input here.
    pub fn raw(sql: impl Into<String>) -> Self {
        Value::Raw(sql.into())
    }

    /// `NOW()`
    pub fn now() -> Self {
        Value::Raw("NOW()".to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text used when the value becomes a map key (`fetch_all_keyed_by`, `assoc_values`).
    pub fn key_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => i64::from(*b).to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => float_text(*f),
            Value::Text(s) | Value::Raw(s) => s.clone(),
        }
    }

    /// Convert to JSON, used when deserializing rows into structs.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) | Value::Raw(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub(crate) fn dedup_key(&self) -> DedupKey {
        match self {
            Value::Null => DedupKey::Null,
            Value::Bool(b) => DedupKey::Int(i64::from(*b)),
            Value::Int(n) => DedupKey::Int(*n),
            Value::Float(f) => DedupKey::Float(f.to_bits()),
            Value::Text(s) => DedupKey::Text(s.clone()),
            Value::Raw(s) => DedupKey::Raw(s.clone()),
        }
    }
}

/// Hashable identity of a value for IN-list de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DedupKey {
    Null,
    Int(i64),
    Float(u64),
    Text(String),
    Raw(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            other => f.write_str(&other.key_string()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<chrono::NaiveDate> for Value {
    fn from(v: chrono::NaiveDate) -> Self {
        Value::Text(v.format("%Y-%m-%d").to_string())
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Value::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Value::Text(v.format("%Y-%m-%d %H:%M:%S%.f+00").to_string())
    }
}

impl TryFrom<u64> for Value {
    type Error = DbError;

    fn try_from(v: u64) -> DbResult<Self> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| DbError::InvalidValueType(format!("u64 {v} does not fit in BIGINT")))
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = DbError;

    fn try_from(v: serde_json::Value) -> DbResult<Self> {
        match v {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| DbError::InvalidValueType(format!("number {n}"))),
            },
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Array(_) => Err(DbError::InvalidValueType("array".to_string())),
            serde_json::Value::Object(_) => Err(DbError::InvalidValueType("object".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_always_bound() {
        assert_eq!(encode(&Value::from("x' OR 1=1"), true), Encoded::Bind);
        assert_eq!(encode(&Value::from(""), false), Encoded::Bind);
    }

    #[test]
    fn numerics_follow_quote_flag() {
        assert_eq!(encode(&Value::Int(5), false), Encoded::Literal("5".into()));
        assert_eq!(encode(&Value::Int(-5), true), Encoded::Literal("'-5'".into()));
        assert_eq!(encode(&Value::Float(1.5), false), Encoded::Literal("1.5".into()));
        assert_eq!(
            encode(&Value::Float(f64::NAN), false),
            Encoded::Literal("'NaN'".into())
        );
        assert_eq!(
            encode(&Value::Float(f64::NEG_INFINITY), false),
            Encoded::Literal("'-Infinity'".into())
        );
    }

    #[test]
    fn bool_null_raw_are_inline() {
        assert_eq!(encode(&Value::Bool(true), false), Encoded::Literal("'1'".into()));
        assert_eq!(encode(&Value::Bool(false), true), Encoded::Literal("'0'".into()));
        assert_eq!(encode(&Value::Null, true), Encoded::Literal("NULL".into()));
        assert_eq!(encode(&Value::now(), true), Encoded::Literal("NOW()".into()));
    }

    #[test]
    fn json_containers_are_rejected() {
        let err = Value::try_from(serde_json::json!([1, 2])).unwrap_err();
        assert!(matches!(err, DbError::InvalidValueType(_)));
        let err = Value::try_from(serde_json::json!({"a": 1})).unwrap_err();
        assert!(matches!(err, DbError::InvalidValueType(_)));
        assert_eq!(
            Value::try_from(serde_json::json!(3)).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
    }
}
