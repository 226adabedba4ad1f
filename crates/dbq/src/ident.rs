//! Identifier and select-expression quoting.
//!
//! SQL identifiers may contain almost any character, so validation is
//! limited to rejecting the two quote characters (`` ` `` and `"`) that could
//! break out of the quoted form.
//!
//! Select and ORDER BY entries go through [`quote_expression`], which also
//! accepts `*`, numeric literals and simple aggregate calls:
//!
//! ```ignore
//! use dbq::{Dialect, ident::quote_expression};
//!
//! assert_eq!(quote_expression(Dialect::MySql, "MIN(id) AS lo")?, "MIN(`id`) AS `lo`");
//! assert_eq!(quote_expression(Dialect::Postgres, "COUNT(*)")?, "COUNT(*)");
//! # Ok::<(), dbq::DbError>(())
//! ```

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use std::sync::OnceLock;

/// Quote a single identifier (column name), rejecting embedded quote characters.
pub fn quote_ident(dialect: Dialect, name: &str) -> DbResult<String> {
    check_ident(name)?;
    let tick = dialect.quote_char();
    Ok(format!("{tick}{name}{tick}"))
}

/// Quote a table name, quoting each `.`-separated segment on its own.
pub fn quote_table(dialect: Dialect, table: &str) -> DbResult<String> {
    check_ident(table)?;
    let tick = dialect.quote_char();
    let mut out = String::with_capacity(table.len() + 4);
    for (i, seg) in table.split('.').enumerate() {
        if seg.is_empty() {
            return Err(DbError::InvalidIdentifier(table.to_string()));
        }
        if i > 0 {
            out.push('.');
        }
        out.push(tick);
        out.push_str(seg);
        out.push(tick);
    }
    Ok(out)
}

/// Quote a select / order expression.
///
/// - `*` and numeric literals pass through unchanged
/// - `func(col)`, `func(*)`, `func()` with an optional `[AS] alias` get the
///   argument and alias quoted
/// - anything else is quoted as a single identifier
pub fn quote_expression(dialect: Dialect, text: &str) -> DbResult<String> {
    if text == "*" || is_numeric(text) {
        return Ok(text.to_string());
    }

    let Some(caps) = function_re().captures(text) else {
        return quote_ident(dialect, text);
    };

    let tick = dialect.quote_char();
    let func = &caps[1];
    let arg = &caps[2];
    let mut out = match arg {
        "*" => format!("{func}(*)"),
        "" => format!("{func}()"),
        _ => format!("{func}({tick}{arg}{tick})"),
    };

    if let Some(alias) = caps.get(5) {
        if caps.get(4).is_some() {
            out.push_str(" AS");
        }
        let alias = alias.as_str();
        if !alias.is_empty() {
            out.push(' ');
            out.push(tick);
            out.push_str(alias);
            out.push(tick);
        }
    }
    Ok(out)
}

fn check_ident(name: &str) -> DbResult<()> {
    if name.is_empty() || name.contains(['`', '"']) {
        return Err(DbError::InvalidIdentifier(format!(
            "{name}. Value may not be empty or contain ` or \""
        )));
    }
    Ok(())
}

fn function_re() -> &'static regex::Regex {
    static FUNCTION_RE: OnceLock<regex::Regex> = OnceLock::new();
    FUNCTION_RE.get_or_init(|| {
        regex::Regex::new(r"(?i)\A([a-z_]+)\(([a-z0-9_*]*)\)(( AS)? ([a-z0-9_]*))?\z")
            .expect("invalid built-in function regex")
    })
}

pub(crate) fn is_numeric(text: &str) -> bool {
    static NUMERIC_RE: OnceLock<regex::Regex> = OnceLock::new();
    NUMERIC_RE
        .get_or_init(|| {
            regex::Regex::new(r"\A\s*[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?\z")
                .expect("invalid built-in numeric regex")
        })
        .is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_identifiers() {
        assert_eq!(quote_ident(Dialect::MySql, "name").unwrap(), "`name`");
        assert_eq!(quote_ident(Dialect::Postgres, "name").unwrap(), "\"name\"");
    }

    #[test]
    fn rejects_quote_characters() {
        assert!(quote_ident(Dialect::MySql, "na`me").is_err());
        assert!(quote_ident(Dialect::Postgres, "na\"me").is_err());
        assert!(quote_ident(Dialect::Postgres, "").is_err());
    }

    #[test]
    fn table_segments_are_quoted_separately() {
        assert_eq!(
            quote_table(Dialect::MySql, "stats.visits").unwrap(),
            "`stats`.`visits`"
        );
        assert!(quote_table(Dialect::MySql, "stats.").is_err());
    }

    #[test]
    fn expressions() {
        let d = Dialect::MySql;
        assert_eq!(quote_expression(d, "*").unwrap(), "*");
        assert_eq!(quote_expression(d, "42").unwrap(), "42");
        assert_eq!(quote_expression(d, "MIN(id)").unwrap(), "MIN(`id`)");
        assert_eq!(quote_expression(d, "COUNT(*)").unwrap(), "COUNT(*)");
        assert_eq!(quote_expression(d, "NOW()").unwrap(), "NOW()");
        assert_eq!(
            quote_expression(d, "max(score) AS best").unwrap(),
            "max(`score`) AS `best`"
        );
        assert_eq!(
            quote_expression(d, "max(score) best").unwrap(),
            "max(`score`) `best`"
        );
        assert_eq!(quote_expression(d, "user name").unwrap(), "`user name`");
    }

    #[test]
    fn injection_in_expression_is_rejected() {
        assert!(quote_expression(Dialect::MySql, "id`; DROP TABLE users; --").is_err());
    }
}
