//! Query log.
//!
//! While the query log is toggled on (see
//! [`Database::toggle_query_log`](crate::Database::toggle_query_log)), every
//! executed statement is recorded in the in-memory [`MemoryQueryLog`] and
//! passed to each registered [`QueryMonitor`].

use crate::config::Engine;
use indexmap::IndexMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::Level;

/// One executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    pub engine: Engine,
    /// Logical database name.
    pub database: String,
    pub sql: String,
    pub success: bool,
    pub elapsed: Duration,
    pub rows_affected: u64,
}

/// Receives executed statements while the query log is enabled.
pub trait QueryMonitor: Send + Sync {
    fn on_query(&self, entry: &QueryLogEntry);
}

/// Statements grouped by engine, in execution order.
#[derive(Debug, Default)]
pub struct MemoryQueryLog {
    entries: Mutex<IndexMap<Engine, Vec<QueryLogEntry>>>,
}

impl MemoryQueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: QueryLogEntry) {
        self.lock().entry(entry.engine).or_default().push(entry);
    }

    /// Snapshot of all entries, grouped by engine.
    pub fn entries(&self) -> IndexMap<Engine, Vec<QueryLogEntry>> {
        self.lock().clone()
    }

    pub fn by_engine(&self, engine: Engine) -> Vec<QueryLogEntry> {
        self.lock().get(&engine).cloned().unwrap_or_default()
    }

    /// Append entries from another log (e.g. one kept by a worker).
    pub fn merge(&self, other: IndexMap<Engine, Vec<QueryLogEntry>>) {
        let mut entries = self.lock();
        for (engine, list) in other {
            entries.entry(engine).or_default().extend(list);
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<Engine, Vec<QueryLogEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueryMonitor for MemoryQueryLog {
    fn on_query(&self, entry: &QueryLogEntry) {
        self.record(entry.clone());
    }
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Emits one `tracing` event (target `dbq.sql`) per logged statement.
#[derive(Debug, Clone)]
pub struct TracingQueryLog {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingQueryLog {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingQueryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryMonitor for TracingQueryLog {
    fn on_query(&self, entry: &QueryLogEntry) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(&entry.sql);
        emit_at_level!(
            self.level,
            target: "dbq.sql",
            engine = %entry.engine,
            database = %entry.database,
            success = entry.success,
            elapsed_ms = entry.elapsed.as_secs_f64() * 1000.0,
            rows_affected = entry.rows_affected,
            sql = %sql,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(engine: Engine, sql: &str) -> QueryLogEntry {
        QueryLogEntry {
            engine,
            database: "main".into(),
            sql: sql.into(),
            success: true,
            elapsed: Duration::from_millis(1),
            rows_affected: 0,
        }
    }

    #[test]
    fn groups_by_engine_and_merges() {
        let log = MemoryQueryLog::new();
        log.record(entry(Engine::MySql, "SELECT 1"));
        log.record(entry(Engine::Postgres, "SELECT 2"));
        log.record(entry(Engine::MySql, "SELECT 3"));
        assert_eq!(log.by_engine(Engine::MySql).len(), 2);
        assert_eq!(log.len(), 3);

        let other = MemoryQueryLog::new();
        other.merge(log.entries());
        other.merge(log.entries());
        assert_eq!(other.by_engine(Engine::Postgres).len(), 2);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
        assert_eq!(truncate_sql_bytes("abc", 10), "abc");
        let log = TracingQueryLog::new().max_sql_length(3);
        assert_eq!(log.truncate_sql("SELECT"), "SEL...");
    }
}
