//! Read/write routing decisions.

use crate::config::ReadPreference;
use crate::query::Operation;
use crate::sql::is_select_query;
use regex::Regex;

/// Where a statement should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Read,
    Write,
    /// Try the write endpoint, fall back to read if it cannot be reached.
    PreferWrite,
}

/// Everything [`decide`] looks at.
#[derive(Debug, Clone, Copy)]
pub struct RouteInput<'a> {
    /// Operation of the builder, `None` for raw statements.
    pub operation: Option<Operation>,
    pub sql: &'a str,
    pub preference: ReadPreference,
    pub master_only: Option<&'a Regex>,
    pub last_id_functions: &'a [&'a str],
    /// Set by callers that must see their own writes (e.g. `SHOW PROCESSLIST`).
    pub force_write: bool,
}

/// Pick the endpoint side for one statement.
pub fn decide(input: &RouteInput<'_>) -> Route {
    let route = decide_inner(input);
    tracing::trace!(
        target: "dbq.router",
        operation = ?input.operation,
        preference = ?input.preference,
        ?route,
        "route decided"
    );
    route
}

fn decide_inner(input: &RouteInput<'_>) -> Route {
    if input.force_write || input.preference == ReadPreference::Master {
        return Route::Write;
    }

    let is_select = match input.operation {
        Some(op) => op.is_read(),
        None if input.sql.trim().is_empty() => return Route::Read,
        None => is_select_query(input.sql),
    };
    if !is_select {
        return Route::Write;
    }

    if input.master_only.is_some_and(|re| re.is_match(input.sql)) {
        return Route::Write;
    }
    if reads_last_id(input.sql, input.last_id_functions) {
        return Route::Write;
    }

    if input.preference == ReadPreference::PreferMaster {
        Route::PreferWrite
    } else {
        Route::Read
    }
}

fn reads_last_id(sql: &str, functions: &[&str]) -> bool {
    if functions.is_empty() {
        return false;
    }
    let upper = sql.to_ascii_uppercase();
    functions.iter().any(|f| upper.contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::master_only_regex;
    use crate::dialect::Dialect;

    fn input(operation: Option<Operation>, sql: &str) -> RouteInput<'_> {
        RouteInput {
            operation,
            sql,
            preference: ReadPreference::Default,
            master_only: None,
            last_id_functions: Dialect::MySql.last_id_functions(),
            force_write: false,
        }
    }

    #[test]
    fn selects_read_and_writes_write() {
        assert_eq!(decide(&input(Some(Operation::Select), "SELECT 1")), Route::Read);
        assert_eq!(decide(&input(Some(Operation::Update), "UPDATE t SET a=1")), Route::Write);
        assert_eq!(decide(&input(None, "DELETE FROM t")), Route::Write);
        assert_eq!(decide(&input(None, "  (SELECT 1)")), Route::Read);
        assert_eq!(decide(&input(None, "SHOW TABLES")), Route::Read);
    }

    #[test]
    fn master_preference_wins() {
        let mut i = input(Some(Operation::Select), "SELECT 1");
        i.preference = ReadPreference::Master;
        assert_eq!(decide(&i), Route::Write);
        i.preference = ReadPreference::PreferMaster;
        assert_eq!(decide(&i), Route::PreferWrite);
    }

    #[test]
    fn master_only_tables_and_last_id() {
        let re = master_only_regex(&["jobs".into()]).unwrap();
        let mut i = input(None, "SELECT * FROM `jobs`");
        i.master_only = re.as_ref();
        assert_eq!(decide(&i), Route::Write);

        assert_eq!(decide(&input(None, "select last_insert_id()")), Route::Write);

        let mut pg = input(None, "SELECT currval('seq')");
        pg.last_id_functions = Dialect::Postgres.last_id_functions();
        assert_eq!(decide(&pg), Route::Write);
    }

    #[test]
    fn force_write_overrides_select() {
        let mut i = input(None, "SHOW FULL PROCESSLIST");
        i.force_write = true;
        assert_eq!(decide(&i), Route::Write);
    }
}
