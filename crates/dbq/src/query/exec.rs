use super::Query;
use crate::client::Connector;
use crate::database::Database;
use crate::dialect::{Dialect, InsertIdStrategy};
use crate::error::{DbError, DbResult};
use crate::row::{FromRow, Row};
use crate::sql::BuiltQuery;
use crate::statement::{Keyed, Statement};
use crate::value::Value;
use indexmap::IndexMap;

impl Query {
    /// Render, route and execute the query.
    ///
    /// An empty render fails with [`DbError::EmptyStatement`] before any
    /// connection is opened.
    pub async fn execute<C: Connector>(&self, db: &Database<C>) -> DbResult<Statement> {
        let built = self.build();
        if built.is_empty() {
            return Err(DbError::EmptyStatement);
        }
        self.check_dialect(db)?;

        if !self.returns_id() {
            return db.run(self.database(), self.operation, built, false).await;
        }

        if let Some(id) = self.supplied_id().cloned() {
            return Ok(db
                .run(self.database(), self.operation, built, false)
                .await?
                .with_insert_id(Some(id)));
        }

        let conn = db
            .acquire(self.database(), self.operation, &built.sql, false)
            .await?;
        let rs = db.run_on(&conn, &built).await?;
        match self.dialect.insert_id_strategy() {
            InsertIdStrategy::Returning => {
                let id = rs.rows.first().and_then(|row| row.first()).cloned();
                Ok(Statement::from_result(rs).with_insert_id(id))
            }
            InsertIdStrategy::LastInsertIdQuery => {
                let follow_up = BuiltQuery::new("SELECT LAST_INSERT_ID()", Vec::new());
                let id = db
                    .run_on(&conn, &follow_up)
                    .await?
                    .rows
                    .into_iter()
                    .next()
                    .and_then(|row| row.into_iter().next());
                Ok(Statement::from_result(rs).with_insert_id(id))
            }
        }
    }

    pub(super) fn check_dialect<C: Connector>(&self, db: &Database<C>) -> DbResult<()> {
        let engine = db.engine(self.database())?;
        if Dialect::from(engine) != self.dialect {
            return Err(DbError::invalid_argument(format!(
                "query built for {} cannot run on {} database",
                self.dialect, engine
            )));
        }
        Ok(())
    }

    /// First row, if any.
    pub async fn fetch_one<C: Connector>(&self, db: &Database<C>) -> DbResult<Option<Row>> {
        Ok(self.execute(db).await?.fetch())
    }

    pub async fn fetch_all<C: Connector>(&self, db: &Database<C>) -> DbResult<Vec<Row>> {
        Ok(self.execute(db).await?.fetch_all())
    }

    /// All rows mapped through [`FromRow`].
    pub async fn fetch_as<T: FromRow, C: Connector>(&self, db: &Database<C>) -> DbResult<Vec<T>> {
        self.fetch_all(db).await?.iter().map(T::from_row).collect()
    }

    pub async fn fetch_all_keyed_by<C: Connector>(
        &self,
        db: &Database<C>,
        keys: &[&str],
    ) -> DbResult<IndexMap<String, Keyed>> {
        self.execute(db).await?.fetch_all_keyed_by(keys)
    }

    /// First column of the first row.
    pub async fn value<C: Connector>(&self, db: &Database<C>) -> DbResult<Option<Value>> {
        Ok(self.execute(db).await?.value())
    }

    /// First column of every row.
    pub async fn values<C: Connector>(&self, db: &Database<C>) -> DbResult<Vec<Value>> {
        Ok(self.execute(db).await?.values())
    }

    /// First column → second column.
    pub async fn assoc_values<C: Connector>(&self, db: &Database<C>) -> DbResult<IndexMap<String, Value>> {
        Ok(self.execute(db).await?.assoc_values())
    }

    pub async fn rows_affected<C: Connector>(&self, db: &Database<C>) -> DbResult<u64> {
        Ok(self.execute(db).await?.rows_affected())
    }

    /// Quote a string literal through the driver of this query's database.
    pub async fn quote<C: Connector>(&self, db: &Database<C>, text: &str) -> DbResult<String> {
        db.quote(self.database(), text).await
    }
}
