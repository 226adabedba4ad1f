use super::{Operation, Query};
use crate::dialect::InsertIdStrategy;
use crate::sql::{BuiltQuery, SqlBuf};

impl Query {
    /// Render SQL text and bind arguments for the active operation.
    ///
    /// Returns an empty statement when no operation is set and nothing is
    /// staged, or for an UPDATE without assignments.
    pub fn build(&self) -> BuiltQuery {
        match self.operation {
            None => self
                .staged
                .clone()
                .unwrap_or_else(|| BuiltQuery::new("", Vec::new())),
            Some(_) => self.render().build(self.dialect),
        }
    }

    /// Rendered SQL text only.
    pub fn to_sql(&self) -> String {
        self.build().sql
    }

    fn render(&self) -> SqlBuf {
        match self.operation {
            Some(Operation::Select) => self.render_select(),
            Some(Operation::Update) => self.render_update(),
            Some(Operation::Insert) => self.render_insert(false),
            Some(Operation::InsertIgnore) => self.render_insert(true),
            Some(Operation::Upsert) => self.render_upsert(),
            Some(Operation::Delete) => self.render_delete(),
            None => SqlBuf::empty(),
        }
    }

    fn render_select(&self) -> SqlBuf {
        let mut sql = SqlBuf::new("SELECT");
        if self.distinct {
            sql.push(" DISTINCT");
        }
        sql.push(&format!(" {} FROM {}", self.select, self.table_quoted));

        self.push_where(&mut sql);
        if !self.group.is_empty() {
            sql.push(" GROUP BY ").push(&self.group);
        }
        if !self.having.is_empty() {
            sql.push(" HAVING ").push(&self.having);
        }
        if !self.order.is_empty() {
            sql.push(" ORDER BY ").push_buf(&self.order);
        }
        if let Some(limit) = self.limit {
            sql.push(&format!(" LIMIT {limit}"));
            if self.offset > 0 {
                sql.push(&format!(" OFFSET {}", self.offset));
            }
        }

        if self.unions.is_empty() {
            return sql;
        }

        let mut out = SqlBuf::new("(");
        out.push_sql(sql).push(")");
        for union in &self.unions {
            out.push(" UNION (").push_sql(union.render()).push(")");
        }
        out
    }

    fn render_update(&self) -> SqlBuf {
        if self.update.is_empty() {
            return SqlBuf::empty();
        }
        let mut sql = SqlBuf::new(format!("UPDATE {} SET ", self.table_quoted));
        sql.push_buf(&self.update);
        self.push_where(&mut sql);
        sql
    }

    fn render_delete(&self) -> SqlBuf {
        let mut sql = SqlBuf::new(format!("DELETE FROM {}", self.table_quoted));
        self.push_where(&mut sql);
        sql
    }

    fn render_insert(&self, ignore: bool) -> SqlBuf {
        let dialect = self.dialect;
        let mut sql = SqlBuf::new("INSERT");
        if ignore {
            sql.push(dialect.insert_ignore_keyword());
        }
        if self.delayed && dialect.supports_delayed_insert() {
            sql.push(" DELAYED");
        }
        sql.push(&format!(" INTO {}", self.table_quoted));

        if self.insert_columns.is_empty() && !dialect.allows_empty_column_list() {
            sql.push(" DEFAULT VALUES");
        } else {
            sql.push(&format!(" ({}) VALUES (", self.insert_columns.join(",")));
            sql.push_value_list(self.data.values(), self.always_quote);
            sql.push(")");
        }

        if ignore {
            sql.push(dialect.insert_ignore_suffix());
        }
        if self.returns_id() && dialect.insert_id_strategy() == InsertIdStrategy::Returning {
            let tick = dialect.quote_char();
            sql.push(&format!(" RETURNING {tick}id{tick}"));
        }
        sql
    }

    fn render_upsert(&self) -> SqlBuf {
        let mut sql = self.render_insert(false);
        let updates = self
            .data
            .keys()
            .zip(&self.insert_columns)
            .filter(|(name, _)| !self.upsert_ignore.iter().any(|c| c == *name))
            .map(|(_, quoted)| format!("{quoted}=VALUES({quoted})"))
            .collect::<Vec<_>>();
        if !updates.is_empty() {
            sql.push(" ON DUPLICATE KEY UPDATE ").push(&updates.join(", "));
        }
        sql
    }

    fn push_where(&self, sql: &mut SqlBuf) {
        if !self.where_sql.is_empty() {
            sql.push(" WHERE ").push_buf(&self.where_sql);
        }
    }
}
