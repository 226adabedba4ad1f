//! Table-bound query builder.
//!
//! A [`Query`] is bound to one table and (optionally) one logical database.
//! Builder methods consume and return the query; the ones that validate input
//! return `DbResult<Query>` so misuse fails at the call site:
//!
//! ```ignore
//! use dbq::prelude::*;
//!
//! let rows = db
//!     .table("users")?
//!     .select(["id", "name", "COUNT(*) AS n"])?
//!     .filter(Where::new().field("status", "active").field("kind", ["a", "b"]))?
//!     .filter(Condition::gt("age", 18))?
//!     .group(["id", "name"])?
//!     .order([("name", "ASC")])?
//!     .limit(20)
//!     .fetch_all(&db)
//!     .await?;
//!
//! let id = db
//!     .table("users")?
//!     .insert_get_id(record([("name", "alice")]))?
//!     .execute(&db)
//!     .await?
//!     .insert_id()
//!     .cloned();
//! ```
//!
//! Rendering dispatches on the active [`Operation`]. A query with no
//! operation renders its staged statement (see [`Query::with_statement`]) or
//! nothing at all; executing an empty render fails with
//! [`DbError::EmptyStatement`](crate::DbError::EmptyStatement).

mod admin;
mod batch;
mod exec;
mod render;

#[cfg(test)]
mod tests;

pub use admin::ProcessInfo;
pub use batch::{BatchResult, INSERT_CHUNK_SIZE, MAX_BIND_PARAMS, UPDATE_CHUNK_SIZE};

use crate::condition::Where;
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::ident::{quote_expression, quote_ident, quote_table};
use crate::sql::{BuiltQuery, SqlBuf};
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;

/// Ordered field → value mapping used for inserts and updates.
pub type Record = IndexMap<String, Value>;

/// Build a [`Record`] from `(field, value)` pairs.
pub fn record<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Record
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Statement kind a query can be switched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Update,
    Insert,
    InsertIgnore,
    Upsert,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Select => "SELECT",
            Operation::Update => "UPDATE",
            Operation::Insert => "INSERT",
            Operation::InsertIgnore => "INSERT IGNORE",
            Operation::Upsert => "UPSERT",
            Operation::Delete => "DELETE",
        }
    }

    /// Only SELECT may be served by a read replica.
    pub fn is_read(self) -> bool {
        matches!(self, Operation::Select)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query builder bound to one table.
#[derive(Debug, Clone)]
pub struct Query {
    table: String,
    table_quoted: String,
    database: Option<String>,
    dialect: Dialect,
    allowed: Vec<Operation>,
    operation: Option<Operation>,
    select: String,
    distinct: bool,
    where_sql: SqlBuf,
    group: String,
    having: String,
    order: SqlBuf,
    limit: Option<u64>,
    offset: u64,
    data: Record,
    insert_columns: Vec<String>,
    upsert_ignore: Vec<String>,
    update: SqlBuf,
    unions: Vec<Query>,
    return_id: bool,
    delayed: bool,
    always_quote: bool,
    staged: Option<BuiltQuery>,
}

impl Query {
    /// Create a query for `table` rendered in `dialect`.
    ///
    /// Dotted names (`schema.table`) are quoted segment by segment.
    pub fn new(dialect: Dialect, table: impl Into<String>) -> DbResult<Self> {
        let table = table.into();
        let table_quoted = quote_table(dialect, &table)?;
        Ok(Self {
            table,
            table_quoted,
            database: None,
            dialect,
            allowed: Vec::new(),
            operation: None,
            select: "*".to_string(),
            distinct: false,
            where_sql: SqlBuf::empty(),
            group: String::new(),
            having: String::new(),
            order: SqlBuf::empty(),
            limit: None,
            offset: 0,
            data: Record::new(),
            insert_columns: Vec::new(),
            upsert_ignore: Vec::new(),
            update: SqlBuf::empty(),
            unions: Vec::new(),
            return_id: false,
            delayed: false,
            always_quote: false,
            staged: None,
        })
    }

    /// Bind the query to a logical database name (default database otherwise).
    pub fn on_database(mut self, name: impl Into<String>) -> Self {
        self.database = Some(name.into());
        self
    }

    /// Restrict which operations this instance may be switched to.
    ///
    /// An empty list allows everything.
    pub fn allow_operations(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.allowed = ops.into_iter().collect();
        self
    }

    /// Quote inlined numerics (`'5'` instead of `5`) so that comparisons on
    /// textual columns keep using their indexes.
    pub fn always_quote(mut self, on: bool) -> Self {
        self.always_quote = on;
        self
    }

    /// Stage a raw statement, rendered when no operation is set.
    pub fn with_statement(mut self, sql: impl Into<String>, args: Vec<Value>) -> Self {
        self.staged = Some(BuiltQuery::new(sql, args));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub(crate) fn table_quoted(&self) -> &str {
        &self.table_quoted
    }

    pub(crate) fn ensure_allowed(&self, op: Operation) -> DbResult<()> {
        if !self.allowed.is_empty() && !self.allowed.contains(&op) {
            return Err(DbError::OperationNotAllowed(op.as_str().to_string()));
        }
        Ok(())
    }

    fn set_operation(&mut self, op: Operation) -> DbResult<()> {
        self.ensure_allowed(op)?;
        self.operation = Some(op);
        Ok(())
    }

    fn quote_ident_name(&self, name: &str) -> DbResult<String> {
        quote_ident(self.dialect, name)
    }

    // ==================== SELECT ====================

    /// `SELECT` the given columns or expressions.
    ///
    /// Each entry must be `*`, a numeric literal, a column name, or a simple
    /// function call such as `MIN(id)`, `COUNT(*)` or `MAX(score) AS best`.
    pub fn select<I, S>(mut self, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_operation(Operation::Select)?;
        let mut parts = Vec::new();
        for column in columns {
            let column = column.as_ref();
            if column.is_empty() {
                continue;
            }
            parts.push(quote_expression(self.dialect, column)?);
        }
        self.select = if parts.is_empty() {
            "*".to_string()
        } else {
            parts.join(",")
        };
        Ok(self)
    }

    /// `SELECT` a raw SQL expression list.
    ///
    /// **Never** pass user input here: the text is not escaped.
    pub fn select_raw(mut self, sql: impl Into<String>) -> DbResult<Self> {
        self.set_operation(Operation::Select)?;
        self.select = sql.into();
        Ok(self)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== WHERE ====================

    /// AND the given conditions into the WHERE clause. Empty input is a no-op.
    pub fn filter(mut self, input: impl Into<Where>) -> DbResult<Self> {
        self.apply_where(input.into(), false)?;
        Ok(self)
    }

    /// Like [`filter`](Self::filter) with every operator negated.
    pub fn filter_not(mut self, input: impl Into<Where>) -> DbResult<Self> {
        self.apply_where(input.into(), true)?;
        Ok(self)
    }

    /// AND a raw SQL clause into the WHERE clause.
    ///
    /// **Never** pass user input here.
    pub fn filter_raw(mut self, sql: impl AsRef<str>) -> Self {
        let sql = sql.as_ref();
        if !sql.is_empty() {
            if !self.where_sql.is_empty() {
                self.where_sql.push(" AND ");
            }
            self.where_sql.push(sql);
        }
        self
    }

    fn apply_where(&mut self, input: Where, negate: bool) -> DbResult<()> {
        let Some(expr) = input.into_expr(negate)? else {
            return Ok(());
        };
        let mut part = SqlBuf::empty();
        expr.append_to(&mut part, self.dialect, self.always_quote)?;
        if !self.where_sql.is_empty() {
            self.where_sql.push(" AND ");
        }
        self.where_sql.push_sql(part);
        Ok(())
    }

    // ==================== GROUP / HAVING / ORDER ====================

    pub fn group<I, S>(mut self, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let quoted = columns
            .into_iter()
            .map(|c| self.quote_ident_name(c.as_ref()))
            .collect::<DbResult<Vec<_>>>()?;
        self.group = quoted.join(",");
        Ok(self)
    }

    /// Raw GROUP BY text.
    pub fn group_raw(mut self, sql: impl Into<String>) -> Self {
        self.group = sql.into();
        self
    }

    /// Raw HAVING text.
    pub fn having(mut self, sql: impl Into<String>) -> Self {
        self.having = sql.into();
        self
    }

    /// Replace the ORDER BY clause with `(column, "ASC" | "DESC")` pairs.
    pub fn order<I, K, D>(self, pairs: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: AsRef<str>,
    {
        self.set_order(pairs, true)
    }

    /// Like [`order`](Self::order) but columns are used as given (directions
    /// are still validated).
    pub fn order_raw<I, K, D>(self, pairs: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: AsRef<str>,
    {
        self.set_order(pairs, false)
    }

    fn set_order<I, K, D>(mut self, pairs: I, escape: bool) -> DbResult<Self>
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: AsRef<str>,
    {
        let mut order = SqlBuf::empty();
        for (i, (column, direction)) in pairs.into_iter().enumerate() {
            let direction = direction.as_ref();
            if direction != "ASC" && direction != "DESC" {
                return Err(DbError::InvalidSortDirection(direction.to_string()));
            }
            let column = if escape {
                quote_expression(self.dialect, column.as_ref())?
            } else {
                column.as_ref().to_string()
            };
            if i > 0 {
                order.push(", ");
            }
            order.push(&format!("{column} {direction}"));
        }
        self.order = order;
        Ok(self)
    }

    /// Order rows whose `field` matches `values` first, in the given order.
    ///
    /// Appends to the current ORDER BY. Fewer than two values is a no-op.
    pub fn order_by_values<I, V>(mut self, field: &str, values: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.len() < 2 {
            return Ok(self);
        }
        let field = self.quote_ident_name(field)?;
        let mut part = SqlBuf::empty();
        if self.dialect.supports_field_ordering() {
            part.push(&format!("FIELD({field}, "));
            part.push_value_list(&values, self.always_quote);
            part.push(")");
        } else {
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    part.push(",");
                }
                part.push(&format!("{field}="));
                part.push_value(value, self.always_quote);
                part.push(" DESC");
            }
        }
        if !self.order.is_empty() {
            self.order.push(", ");
        }
        self.order.push_sql(part);
        Ok(self)
    }

    /// LIMIT, clamped to zero.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.max(0) as u64);
        self
    }

    /// OFFSET, clamped to zero. Only rendered together with a LIMIT.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset.max(0) as u64;
        self
    }

    /// `(this) UNION (other)`. Both queries must use the same dialect.
    pub fn union(mut self, other: Query) -> DbResult<Self> {
        if other.dialect != self.dialect {
            return Err(DbError::unsupported(format!(
                "cannot UNION a {} query into a {} query",
                other.dialect, self.dialect
            )));
        }
        if other.build().is_empty() {
            return Err(DbError::invalid_argument("UNION needs a query with an operation"));
        }
        self.unions.push(other);
        Ok(self)
    }

    // ==================== INSERT ====================

    pub fn insert(mut self, data: Record) -> DbResult<Self> {
        self.set_operation(Operation::Insert)?;
        self.set_data(data)?;
        Ok(self)
    }

    /// INSERT that skips rows conflicting with a unique key.
    pub fn insert_ignore(mut self, data: Record) -> DbResult<Self> {
        self.set_operation(Operation::InsertIgnore)?;
        self.set_data(data)?;
        Ok(self)
    }

    /// INSERT and read back the generated id (see [`Statement::insert_id`](crate::Statement::insert_id)).
    pub fn insert_get_id(mut self, data: Record) -> DbResult<Self> {
        self.return_id = true;
        self.insert(data)
    }

    /// `INSERT DELAYED` where the dialect supports it.
    pub fn delayed(mut self) -> Self {
        self.delayed = true;
        self
    }

    /// Single-row insert-or-update. Columns in `ignore_columns` keep their
    /// current value on conflict.
    pub fn upsert<I, S>(mut self, data: Record, ignore_columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_operation(Operation::Upsert)?;
        self.dialect.ensure_upsert()?;
        self.set_data(data)?;
        self.upsert_ignore = ignore_columns.into_iter().map(Into::into).collect();
        Ok(self)
    }

    fn set_data(&mut self, data: Record) -> DbResult<()> {
        self.insert_columns = data
            .keys()
            .map(|k| self.quote_ident_name(k))
            .collect::<DbResult<_>>()?;
        self.data = data;
        Ok(())
    }

    // ==================== UPDATE ====================

    /// `UPDATE ... SET field=value, ...`
    pub fn update(mut self, fields: Record) -> DbResult<Self> {
        self.set_operation(Operation::Update)?;
        let mut set = SqlBuf::empty();
        for (i, (field, value)) in fields.iter().enumerate() {
            if i > 0 {
                set.push(", ");
            }
            set.push(&format!("{}=", self.quote_ident_name(field)?));
            set.push_value(value, self.always_quote);
        }
        self.update = set;
        Ok(self)
    }

    /// `UPDATE ... SET field=expr` with both sides used verbatim.
    ///
    /// **Never** pass user input here.
    pub fn update_raw<I, K, V>(mut self, assignments: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.set_operation(Operation::Update)?;
        let set = assignments
            .into_iter()
            .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
            .collect::<Vec<_>>()
            .join(", ");
        self.update = SqlBuf::new(set);
        Ok(self)
    }

    /// Add (or subtract, for negative amounts) to numeric columns.
    ///
    /// With `coalesce_null_to_zero`, NULL columns are treated as 0; otherwise
    /// NULL stays NULL.
    pub fn increment<I, K, V>(mut self, amounts: I, coalesce_null_to_zero: bool) -> DbResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.set_operation(Operation::Update)?;
        let mut set = SqlBuf::empty();
        for (i, (field, amount)) in amounts.into_iter().enumerate() {
            let field = self.quote_ident_name(field.as_ref())?;
            let current = if coalesce_null_to_zero {
                format!("COALESCE({field}, 0)")
            } else {
                field.clone()
            };
            if i > 0 {
                set.push(", ");
            }
            let amount = amount.into();
            match amount {
                Value::Int(n) if n < 0 => {
                    set.push(&format!("{field}={current} - "));
                    set.push_value(&Value::Int(n.saturating_abs()), self.always_quote);
                }
                Value::Float(f) if f < 0.0 => {
                    set.push(&format!("{field}={current} - "));
                    set.push_value(&Value::Float(f.abs()), self.always_quote);
                }
                Value::Int(_) | Value::Float(_) => {
                    set.push(&format!("{field}={current} + "));
                    set.push_value(&amount, self.always_quote);
                }
                other => {
                    return Err(DbError::InvalidValueType(format!(
                        "increment amount for {field} must be numeric, found {other:?}"
                    )));
                }
            }
        }
        self.update = set;
        Ok(self)
    }

    // ==================== DELETE ====================

    /// `DELETE FROM ...` with the same condition rules as [`filter`](Self::filter).
    pub fn delete(mut self, input: impl Into<Where>) -> DbResult<Self> {
        self.set_operation(Operation::Delete)?;
        self.apply_where(input.into(), false)?;
        Ok(self)
    }

    /// Literal-quote text for the query's dialect.
    pub fn quote_literal(&self, text: &str) -> String {
        self.dialect.quote_literal(text)
    }

    /// The explicit id supplied in the insert data, if any.
    pub(crate) fn supplied_id(&self) -> Option<&Value> {
        match self.data.get("id") {
            None | Some(Value::Null) | Some(Value::Int(0)) => None,
            Some(Value::Text(s)) if s.is_empty() => None,
            Some(v) => Some(v),
        }
    }

    pub(crate) fn returns_id(&self) -> bool {
        self.return_id && self.operation == Some(Operation::Insert)
    }
}
