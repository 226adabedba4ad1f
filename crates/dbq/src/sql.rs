//! SQL fragment buffer with deferred placeholder rendering.
//!
//! [`SqlBuf`] stores SQL pieces and bind values separately. Placeholders are
//! only rendered by [`SqlBuf::build`], once the whole statement is assembled,
//! so `$n` numbering stays correct no matter how fragments are composed.
//!
//! ```ignore
//! use dbq::{Dialect, Value, sql::SqlBuf};
//!
//! let mut q = SqlBuf::new("SELECT * FROM users WHERE name = ");
//! q.push_value(&Value::from("alice"), true);
//! q.push(" AND age > ").push_value(&Value::Int(30), false);
//!
//! let built = q.build(Dialect::Postgres);
//! assert_eq!(built.sql, "SELECT * FROM users WHERE name = $1 AND age > 30");
//! ```

use crate::dialect::Dialect;
use crate::value::{Encoded, Value, encode};
use std::fmt::Write;

#[derive(Debug, Clone)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A composable SQL fragment with its bind values.
#[derive(Debug, Clone, Default)]
pub struct SqlBuf {
    parts: Vec<SqlPart>,
    params: Vec<Value>,
}

/// Rendered SQL text plus bind arguments in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }
}

impl SqlBuf {
    /// Create a buffer with an initial SQL fragment.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        let mut buf = Self::default();
        buf.push(&initial_sql.into());
        buf
    }

    /// Create an empty buffer.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Number of bind values queued so far.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a value: inline literal or bind placeholder depending on its encoding.
    pub fn push_value(&mut self, value: &Value, always_quote: bool) -> &mut Self {
        match encode(value, always_quote) {
            Encoded::Literal(text) => self.push(&text),
            Encoded::Bind => self.push_bind(value.clone()),
        }
    }

    /// Append a placeholder and bind `value`, whatever its type.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(value);
        self
    }

    /// Append comma-separated values (no surrounding parentheses).
    pub fn push_value_list<'a>(
        &mut self,
        values: impl IntoIterator<Item = &'a Value>,
        always_quote: bool,
    ) -> &mut Self {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(",");
            }
            self.push_value(v, always_quote);
        }
        self
    }

    /// Append another fragment, consuming it.
    pub fn push_sql(&mut self, mut other: SqlBuf) -> &mut Self {
        if let (Some(SqlPart::Raw(last)), Some(SqlPart::Raw(first))) =
            (self.parts.last_mut(), other.parts.first())
        {
            last.push_str(first);
            other.parts.remove(0);
        }
        self.parts.append(&mut other.parts);
        self.params.append(&mut other.params);
        self
    }

    /// Append a copy of another fragment.
    pub fn push_buf(&mut self, other: &SqlBuf) -> &mut Self {
        self.push_sql(other.clone())
    }

    /// Render placeholders for `dialect`.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        let mut idx: usize = 0;

        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    let _ = write!(&mut out, "{}", dialect.placeholder(idx));
                }
            }
        }
        out
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Render and take the bind values.
    pub fn build(self, dialect: Dialect) -> BuiltQuery {
        let sql = self.to_sql(dialect);
        BuiltQuery {
            sql,
            args: self.params,
        }
    }
}

/// Strip leading whitespace, SQL comments (`--` and `/* */`), and parentheses
/// from a SQL string to find the first meaningful keyword.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            if let Some(pos) = s.find('\n') {
                s = &s[pos + 1..];
                continue;
            }
            return "";
        }
        if s.starts_with("/*") {
            if let Some(pos) = s.find("*/") {
                s = &s[pos + 2..];
                continue;
            }
            return "";
        }
        if let Some(rest) = s.strip_prefix('(') {
            s = rest;
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) => {
            prefix.eq_ignore_ascii_case(keyword)
                && s[keyword.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_')
        }
        None => false,
    }
}

/// Whether raw SQL text only reads data.
///
/// `SELECT`, `SHOW` and `EXPLAIN [EXTENDED] SELECT` count as reads; comments
/// and leading parentheses are skipped.
pub fn is_select_query(sql: &str) -> bool {
    let s = strip_sql_prefix(sql);
    if starts_with_keyword(s, "SELECT") || starts_with_keyword(s, "SHOW") {
        return true;
    }
    if starts_with_keyword(s, "EXPLAIN") {
        let mut rest = s["EXPLAIN".len()..].trim_start();
        if starts_with_keyword(rest, "EXTENDED") {
            rest = rest["EXTENDED".len()..].trim_start();
        }
        return starts_with_keyword(strip_sql_prefix(rest), "SELECT");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_placeholders_in_order() {
        let mut q = SqlBuf::new("SELECT * FROM users WHERE a = ");
        q.push_value(&Value::from("x"), true)
            .push(" AND b = ")
            .push_value(&Value::from("y"), true);

        let pg = q.clone().build(Dialect::Postgres);
        assert_eq!(pg.sql, "SELECT * FROM users WHERE a = $1 AND b = $2");
        assert_eq!(pg.args, vec![Value::from("x"), Value::from("y")]);

        let my = q.build(Dialect::MySql);
        assert_eq!(my.sql, "SELECT * FROM users WHERE a = ? AND b = ?");
    }

    #[test]
    fn composed_fragments_renumber() {
        let mut w = SqlBuf::new(" WHERE id = ");
        w.push_value(&Value::from("7"), true);

        let mut q = SqlBuf::new("UPDATE t SET name = ");
        q.push_value(&Value::from("n"), true);
        q.push_sql(w);

        assert_eq!(
            q.to_sql(Dialect::Postgres),
            "UPDATE t SET name = $1 WHERE id = $2"
        );
        assert_eq!(q.param_count(), 2);
    }

    #[test]
    fn literal_values_do_not_grow_params() {
        let mut q = SqlBuf::empty();
        q.push_value_list(&[Value::Int(1), Value::Null, Value::Bool(true)], false);
        assert_eq!(q.to_sql(Dialect::MySql), "1,NULL,'1'");
        assert_eq!(q.param_count(), 0);
    }

    #[test]
    fn select_detection() {
        assert!(is_select_query("SELECT 1"));
        assert!(is_select_query("  /* tag */ select * from t"));
        assert!(is_select_query("(SELECT a FROM t) UNION (SELECT a FROM u)"));
        assert!(is_select_query("SHOW FULL PROCESSLIST"));
        assert!(is_select_query("EXPLAIN SELECT COUNT(*) FROM t"));
        assert!(is_select_query("EXPLAIN EXTENDED SELECT 1"));
        assert!(!is_select_query("EXPLAIN UPDATE t SET a = 1"));
        assert!(!is_select_query("UPDATE t SET a = 1"));
        assert!(!is_select_query("SELECTED"));
        assert!(!is_select_query("-- only a comment"));
    }
}
