use super::{Operation, Query};
use crate::client::Connector;
use crate::database::Database;
use crate::dialect::Dialect;
use crate::error::DbResult;
use crate::row::Row;
use crate::sql::BuiltQuery;
use crate::value::Value;
use serde::Serialize;

/// One server process, normalized across engines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub process_id: Option<i64>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub client_hostname: Option<String>,
    pub client_port: Option<i64>,
    /// Seconds spent in the current state.
    pub time: Option<i64>,
    pub state: Option<String>,
    pub query: Option<String>,
    /// Empty on PostgreSQL.
    pub command: String,
}

const PG_ACTIVITY_SQL: &str = "SELECT pid, datname, usename, client_hostname, \
    client_addr::text AS client_addr, client_port, \
    EXTRACT(EPOCH FROM (now() - query_start))::bigint AS time, state, query \
    FROM pg_stat_activity";

fn text(row: &Row, column: &str) -> Option<String> {
    row.get::<Option<String>>(column).ok().flatten()
}

fn int(row: &Row, column: &str) -> Option<i64> {
    row.get::<Option<i64>>(column).ok().flatten()
}

impl Query {
    /// Cheap row count of the table.
    ///
    /// Uses the planner estimate (`EXPLAIN` on MySQL, `pg_class.reltuples` on
    /// PostgreSQL) and falls back to an exact `COUNT(*)` when the estimate is
    /// below `exact_count_threshold`. `None` when no estimate is available.
    pub async fn estimated_count<C: Connector>(
        &self,
        db: &Database<C>,
        exact_count_threshold: i64,
    ) -> DbResult<Option<i64>> {
        self.check_dialect(db)?;
        let estimate = match self.dialect {
            Dialect::MySql => {
                let sql = format!("EXPLAIN SELECT COUNT(*) FROM {}", self.table_quoted());
                let rows = db.query(self.database(), &sql, Vec::new()).await?.fetch_all();
                let Some(first) = rows.first() else {
                    return Ok(None);
                };
                if text(first, "Extra").as_deref() == Some("Select tables optimized away") {
                    return self.exact_count(db).await;
                }
                let mut total = 0i64;
                for row in &rows {
                    match int(row, "rows") {
                        Some(n) => total += n,
                        None => return Ok(None),
                    }
                }
                total
            }
            Dialect::Postgres => {
                let relname = self.table().rsplit('.').next().unwrap_or_default();
                let mut stmt = db
                    .query(
                        self.database(),
                        "SELECT reltuples FROM pg_class WHERE relname = $1",
                        vec![Value::from(relname)],
                    )
                    .await?;
                match stmt.value().as_ref().and_then(Value::as_f64) {
                    Some(n) => n as i64,
                    None => return Ok(None),
                }
            }
        };

        if estimate < exact_count_threshold {
            return self.exact_count(db).await;
        }
        Ok(Some(estimate))
    }

    async fn exact_count<C: Connector>(&self, db: &Database<C>) -> DbResult<Option<i64>> {
        let built = BuiltQuery::new(format!("SELECT COUNT(*) FROM {}", self.table_quoted()), Vec::new());
        let mut stmt = db
            .run(self.database(), Some(Operation::Select), built, false)
            .await?;
        Ok(stmt.value().as_ref().and_then(Value::as_i64))
    }

    /// Server processes. MySQL reads `SHOW FULL PROCESSLIST` from the write
    /// endpoint; PostgreSQL reads `pg_stat_activity`.
    pub async fn show_processlist<C: Connector>(&self, db: &Database<C>) -> DbResult<Vec<ProcessInfo>> {
        self.check_dialect(db)?;
        let processes = match self.dialect {
            Dialect::MySql => {
                let built = BuiltQuery::new("SHOW FULL PROCESSLIST", Vec::new());
                let rows = db.run(self.database(), None, built, true).await?.fetch_all();
                rows.iter()
                    .map(|row| {
                        let host = text(row, "Host").unwrap_or_default();
                        let mut parts = host.splitn(2, ':');
                        let hostname = parts.next().map(str::to_string);
                        let port = parts.next().and_then(|p| p.parse().ok());
                        ProcessInfo {
                            process_id: int(row, "Id"),
                            database: text(row, "db"),
                            username: text(row, "User"),
                            client_hostname: hostname,
                            client_port: port,
                            time: int(row, "Time"),
                            state: text(row, "State"),
                            query: text(row, "Info"),
                            command: text(row, "Command").unwrap_or_default(),
                        }
                    })
                    .collect()
            }
            Dialect::Postgres => {
                let rows = db
                    .query(self.database(), PG_ACTIVITY_SQL, Vec::new())
                    .await?
                    .fetch_all();
                rows.iter()
                    .map(|row| ProcessInfo {
                        process_id: int(row, "pid"),
                        database: text(row, "datname"),
                        username: text(row, "usename"),
                        client_hostname: text(row, "client_hostname")
                            .filter(|h| !h.is_empty())
                            .or_else(|| text(row, "client_addr")),
                        client_port: int(row, "client_port"),
                        time: int(row, "time"),
                        state: text(row, "state"),
                        query: text(row, "query"),
                        command: String::new(),
                    })
                    .collect()
            }
        };
        Ok(processes)
    }
}
