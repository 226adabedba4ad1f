//! Per-engine SQL rendering rules.

use crate::config::Engine;
use crate::error::{DbError, DbResult};
use std::fmt;

/// How the id generated by an `INSERT` is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertIdStrategy {
    /// Run `SELECT LAST_INSERT_ID()` on the same connection after the insert.
    LastInsertIdQuery,
    /// Append `RETURNING "id"` and read the first column of the result.
    Returning,
}

/// SQL dialect a query is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    MySql,
    Postgres,
}

impl Dialect {
    /// Identifier quote character.
    pub fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Postgres => '"',
        }
    }

    /// Regular-expression match operator.
    pub fn regexp_operator(self) -> &'static str {
        match self {
            Dialect::MySql => "REGEXP",
            Dialect::Postgres => "~",
        }
    }

    /// Negated regular-expression match operator.
    pub fn not_regexp_operator(self) -> &'static str {
        match self {
            Dialect::MySql => "NOT REGEXP",
            Dialect::Postgres => "!~",
        }
    }

    /// Placeholder for the `index`-th (1-based) bind argument.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
        }
    }

    pub fn insert_id_strategy(self) -> InsertIdStrategy {
        match self {
            Dialect::MySql => InsertIdStrategy::LastInsertIdQuery,
            Dialect::Postgres => InsertIdStrategy::Returning,
        }
    }

    /// Whether `ORDER BY FIELD(col, ...)` is available.
    pub fn supports_field_ordering(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Whether `INSERT ... ON DUPLICATE KEY UPDATE` is available.
    pub fn supports_upsert(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    pub(crate) fn ensure_upsert(self) -> DbResult<()> {
        if self.supports_upsert() {
            Ok(())
        } else {
            Err(DbError::unsupported(format!(
                "UPSERT (INSERT ... ON DUPLICATE KEY UPDATE) is not available for {self}"
            )))
        }
    }

    /// Whether `INSERT DELAYED` is understood. Other dialects drop the flag.
    pub fn supports_delayed_insert(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Whether `INSERT INTO t () VALUES ()` is accepted; otherwise `DEFAULT VALUES` is used.
    pub(crate) fn allows_empty_column_list(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Keyword inserted after `INSERT` for ignore-on-conflict inserts.
    pub(crate) fn insert_ignore_keyword(self) -> &'static str {
        match self {
            Dialect::MySql => " IGNORE",
            Dialect::Postgres => "",
        }
    }

    /// Clause appended to ignore-on-conflict inserts.
    pub(crate) fn insert_ignore_suffix(self) -> &'static str {
        match self {
            Dialect::MySql => "",
            Dialect::Postgres => " ON CONFLICT DO NOTHING",
        }
    }

    /// Volatile functions that read the last generated id of the session.
    pub(crate) fn last_id_functions(self) -> &'static [&'static str] {
        match self {
            Dialect::MySql => &["LAST_INSERT_ID"],
            Dialect::Postgres => &["LASTVAL", "CURRVAL"],
        }
    }

    /// Quote and escape a string literal.
    ///
    /// Prefer bind arguments; this exists for the few statements that need a
    /// literal (catalog lookups by table name).
    pub fn quote_literal(self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('\'');
        for c in text.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if self == Dialect::MySql => out.push_str("\\\\"),
                '\0' if self == Dialect::MySql => out.push_str("\\0"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgresql",
        }
    }
}

impl From<Engine> for Dialect {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::MySql => Dialect::MySql,
            Engine::Postgres => Dialect::Postgres,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_per_dialect() {
        assert_eq!(Dialect::MySql.placeholder(3), "?");
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
    }

    #[test]
    fn literal_quoting_escapes_quotes() {
        assert_eq!(Dialect::Postgres.quote_literal("it's"), "'it''s'");
        assert_eq!(Dialect::MySql.quote_literal("a\\b'"), "'a\\\\b'''");
    }

    #[test]
    fn upsert_only_on_mysql() {
        assert!(Dialect::MySql.ensure_upsert().is_ok());
        assert!(matches!(
            Dialect::Postgres.ensure_upsert(),
            Err(DbError::UnsupportedOperation(_))
        ));
    }
}
