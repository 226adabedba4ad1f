//! Multi-row statements.
//!
//! Large batches are split into several statements that run one after the
//! other without a transaction. The first failing chunk aborts the call;
//! chunks that already ran stay applied. A chunk also ends early once its
//! bound values would pass [`MAX_BIND_PARAMS`].

use super::{Operation, Query, Record};
use crate::client::Connector;
use crate::condition::{Condition, Op, Rhs};
use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::ident::quote_ident;
use crate::sql::SqlBuf;
use crate::statement::Statement;
use crate::value::{Encoded, Value, encode};

/// Rows per multi-row INSERT statement.
pub const INSERT_CHUNK_SIZE: usize = 10_000;

/// Keys per `UPDATE ... CASE` statement.
pub const UPDATE_CHUNK_SIZE: usize = 1_000;

/// Bind parameters one statement may carry on both MySQL and PostgreSQL.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Outcome of a chunked batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Number of statements executed.
    pub statements: usize,
    /// Sum of affected rows over all statements.
    pub rows_affected: u64,
}

impl BatchResult {
    fn add(&mut self, stmt: &Statement) {
        self.statements += 1;
        self.rows_affected += stmt.rows_affected();
    }
}

impl Query {
    /// Multi-row INSERT. Each row needs at least one value per column; extra
    /// values are ignored.
    pub async fn insert_multi<C: Connector>(
        &self,
        db: &Database<C>,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> DbResult<BatchResult> {
        self.insert_chunks(db, Operation::Insert, columns, rows, None).await
    }

    /// [`insert_multi`](Self::insert_multi) skipping rows that conflict with a unique key.
    pub async fn insert_multi_ignore<C: Connector>(
        &self,
        db: &Database<C>,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> DbResult<BatchResult> {
        self.insert_chunks(db, Operation::InsertIgnore, columns, rows, None).await
    }

    /// Multi-row INSERT from records. Columns are taken from the first record;
    /// fields missing from later records are inserted as NULL.
    pub async fn insert_multi_assoc<C: Connector>(
        &self,
        db: &Database<C>,
        records: &[Record],
    ) -> DbResult<BatchResult> {
        let (columns, rows) = records_to_rows(records);
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        self.insert_chunks(db, Operation::Insert, &columns, &rows, None).await
    }

    pub async fn insert_multi_assoc_ignore<C: Connector>(
        &self,
        db: &Database<C>,
        records: &[Record],
    ) -> DbResult<BatchResult> {
        let (columns, rows) = records_to_rows(records);
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        self.insert_chunks(db, Operation::InsertIgnore, &columns, &rows, None).await
    }

    /// Multi-row insert-or-update.
    ///
    /// Every column not in `ignore_columns` is updated on conflict, with
    /// `VALUES(col)` or the matching expression from `column_updates`
    /// (e.g. `("hits", "hits + VALUES(hits)")`).
    pub async fn upsert_multi<C: Connector>(
        &self,
        db: &Database<C>,
        columns: &[&str],
        rows: &[Vec<Value>],
        ignore_columns: &[&str],
        column_updates: &[(&str, &str)],
    ) -> DbResult<BatchResult> {
        self.dialect.ensure_upsert()?;
        let mut updates = Vec::new();
        for column in columns {
            if ignore_columns.contains(column) {
                continue;
            }
            let quoted = quote_ident(self.dialect, column)?;
            match column_updates.iter().find(|(c, _)| c == column) {
                Some((_, expr)) => updates.push(format!("{quoted}={expr}")),
                None => updates.push(format!("{quoted}=VALUES({quoted})")),
            }
        }
        let updates = updates.join(", ");
        let on_duplicate = (!updates.is_empty()).then_some(updates.as_str());
        self.insert_chunks(db, Operation::Upsert, columns, rows, on_duplicate)
            .await
    }

    /// [`upsert_multi`](Self::upsert_multi) from records.
    pub async fn upsert_multi_assoc<C: Connector>(
        &self,
        db: &Database<C>,
        records: &[Record],
        ignore_columns: &[&str],
    ) -> DbResult<BatchResult> {
        let (columns, rows) = records_to_rows(records);
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        self.upsert_multi(db, &columns, &rows, ignore_columns, &[])
            .await
    }

    async fn insert_chunks<C: Connector>(
        &self,
        db: &Database<C>,
        op: Operation,
        columns: &[&str],
        rows: &[Vec<Value>],
        on_duplicate: Option<&str>,
    ) -> DbResult<BatchResult> {
        self.ensure_allowed(op)?;
        if rows.is_empty() {
            return Ok(BatchResult::default());
        }
        if columns.is_empty() {
            return Err(DbError::invalid_argument("multi-row insert needs at least one column"));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() < columns.len()) {
            return Err(DbError::InvalidArity(format!(
                "row {i} has {} values, expected {}",
                row.len(),
                columns.len()
            )));
        }
        self.check_dialect(db)?;

        let dialect = self.dialect;
        let ignore = op == Operation::InsertIgnore;
        let quoted = columns
            .iter()
            .map(|c| quote_ident(dialect, c))
            .collect::<DbResult<Vec<_>>>()?
            .join(",");

        let mut result = BatchResult::default();
        for chunk in insert_chunks_of(rows, columns.len(), self.always_quote) {
            let mut sql = SqlBuf::new("INSERT");
            if ignore {
                sql.push(dialect.insert_ignore_keyword());
            }
            sql.push(&format!(" INTO {} ({quoted}) VALUES ", self.table_quoted()));
            for (i, row) in chunk.iter().enumerate() {
                if i > 0 {
                    sql.push(",");
                }
                sql.push("(");
                sql.push_value_list(&row[..columns.len()], self.always_quote);
                sql.push(")");
            }
            if ignore {
                sql.push(dialect.insert_ignore_suffix());
            }
            if let Some(updates) = on_duplicate {
                sql.push(" ON DUPLICATE KEY UPDATE ").push(updates);
            }
            let stmt = db
                .run(self.database(), Some(op), sql.build(dialect), false)
                .await?;
            result.add(&stmt);
        }
        Ok(result)
    }

    /// Set `value_column` per key with one `CASE` statement per chunk:
    ///
    /// ```sql
    /// UPDATE `t` SET `v` = CASE `k` WHEN '1' THEN 2 WHEN '10' THEN 3 END WHERE `k` IN ('1','10')
    /// ```
    ///
    /// Keys are quoted so textual key columns keep using their index; values
    /// are encoded bare.
    pub async fn update_column<C: Connector>(
        &self,
        db: &Database<C>,
        key_column: &str,
        value_column: &str,
        mapping: &[(Value, Value)],
    ) -> DbResult<BatchResult> {
        self.ensure_allowed(Operation::Update)?;
        if mapping.is_empty() {
            return Ok(BatchResult::default());
        }
        self.check_dialect(db)?;

        let dialect = self.dialect;
        let key_quoted = quote_ident(dialect, key_column)?;
        let value_quoted = quote_ident(dialect, value_column)?;

        let mut result = BatchResult::default();
        for chunk in mapping.chunks(UPDATE_CHUNK_SIZE) {
            let mut sql = SqlBuf::new(format!(
                "UPDATE {} SET {value_quoted} = CASE {key_quoted}",
                self.table_quoted()
            ));
            for (key, value) in chunk {
                sql.push(" WHEN ");
                sql.push_value(key, true);
                sql.push(" THEN ");
                sql.push_value(value, false);
            }
            sql.push(" END WHERE ");
            let keys = chunk.iter().map(|(k, _)| k.clone()).collect();
            Condition::new(key_column, Op::Eq, Rhs::List(keys)).append_to(&mut sql, dialect, true)?;

            let stmt = db
                .run(self.database(), Some(Operation::Update), sql.build(dialect), false)
                .await?;
            result.add(&stmt);
        }
        Ok(result)
    }

    /// [`update_column`](Self::update_column) for several value columns, one
    /// independent batch per column.
    pub async fn update_columns<C: Connector>(
        &self,
        db: &Database<C>,
        key_column: &str,
        columns: &[(&str, Vec<(Value, Value)>)],
    ) -> DbResult<BatchResult> {
        let mut total = BatchResult::default();
        for (value_column, mapping) in columns {
            let r = self.update_column(db, key_column, value_column, mapping).await?;
            total.statements += r.statements;
            total.rows_affected += r.rows_affected;
        }
        Ok(total)
    }

    /// `UPDATE t SET to = from` for every row.
    pub async fn copy_column_data<C: Connector>(
        &self,
        db: &Database<C>,
        from_column: &str,
        to_column: &str,
    ) -> DbResult<Statement> {
        self.ensure_allowed(Operation::Update)?;
        self.check_dialect(db)?;
        let from = quote_ident(self.dialect, from_column)?;
        let to = quote_ident(self.dialect, to_column)?;
        let sql = SqlBuf::new(format!("UPDATE {} SET {to} = {from}", self.table_quoted()));
        db.run(self.database(), Some(Operation::Update), sql.build(self.dialect), false)
            .await
    }
}

/// Split `rows` into runs of at most [`INSERT_CHUNK_SIZE`] rows whose bound
/// values stay within [`MAX_BIND_PARAMS`].
fn insert_chunks_of(rows: &[Vec<Value>], width: usize, always_quote: bool) -> Vec<&[Vec<Value>]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut binds = 0;
    for (i, row) in rows.iter().enumerate() {
        let row_binds = row[..width]
            .iter()
            .filter(|v| matches!(encode(v, always_quote), Encoded::Bind))
            .count();
        if i > start && (i - start == INSERT_CHUNK_SIZE || binds + row_binds > MAX_BIND_PARAMS) {
            chunks.push(&rows[start..i]);
            start = i;
            binds = 0;
        }
        binds += row_binds;
    }
    if start < rows.len() {
        chunks.push(&rows[start..]);
    }
    chunks
}

fn records_to_rows(records: &[Record]) -> (Vec<String>, Vec<Vec<Value>>) {
    let Some(first) = records.first() else {
        return (Vec::new(), Vec::new());
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    let rows = records
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    (columns, rows)
}
