//! Executed statement and its result rows.

use crate::client::ResultSet;
use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Rows grouped by one or more key columns (see [`Statement::fetch_all_keyed_by`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Keyed {
    Row(Row),
    Nested(IndexMap<String, Keyed>),
}

impl Keyed {
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Keyed::Row(row) => Some(row),
            Keyed::Nested(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Keyed> {
        match self {
            Keyed::Nested(map) => map.get(key),
            Keyed::Row(_) => None,
        }
    }
}

/// Result of one executed statement.
///
/// Rows are consumed front to back by the `fetch*` / `value*` methods.
/// Statements without a result set (INSERT / UPDATE / DELETE) behave as if
/// they returned no rows.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    columns: Arc<[String]>,
    rows: VecDeque<Row>,
    result_count: usize,
    rows_affected: u64,
    has_result_set: bool,
    insert_id: Option<Value>,
}

impl Statement {
    pub fn from_result(result: ResultSet) -> Self {
        let columns: Arc<[String]> = Arc::from(result.columns);
        let rows: VecDeque<Row> = result
            .rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Self {
            result_count: rows.len(),
            columns,
            rows,
            rows_affected: result.rows_affected,
            has_result_set: result.has_result_set,
            insert_id: None,
        }
    }

    /// A statement that returned nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn with_insert_id(mut self, id: Option<Value>) -> Self {
        self.insert_id = id;
        self
    }

    /// Next row, if any.
    pub fn fetch(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// All remaining rows.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// All remaining rows keyed by the given columns.
    ///
    /// With one key column the map holds rows directly; each further column
    /// adds one level of nesting. Later rows overwrite earlier rows with the
    /// same key path.
    pub fn fetch_all_keyed_by(&mut self, keys: &[&str]) -> DbResult<IndexMap<String, Keyed>> {
        if keys.is_empty() {
            return Err(DbError::invalid_argument("fetch_all_keyed_by needs at least one key column"));
        }
        for key in keys {
            if !self.columns.iter().any(|c| c == key) {
                return Err(DbError::decode(*key, "no such column"));
            }
        }

        let mut out = IndexMap::new();
        for row in self.rows.drain(..) {
            let path: Vec<String> = keys
                .iter()
                .map(|k| row.get_value(k).map(Value::key_string).unwrap_or_default())
                .collect();
            insert_keyed(&mut out, &path, row);
        }
        Ok(out)
    }

    /// First column of the next row.
    pub fn value(&mut self) -> Option<Value> {
        self.fetch().and_then(|row| row.into_values().into_iter().next())
    }

    /// First column of every remaining row.
    pub fn values(&mut self) -> Vec<Value> {
        self.rows
            .drain(..)
            .filter_map(|row| row.into_values().into_iter().next())
            .collect()
    }

    /// First column → second column for every remaining row.
    pub fn assoc_values(&mut self) -> IndexMap<String, Value> {
        self.rows
            .drain(..)
            .filter_map(|row| {
                let mut values = row.into_values().into_iter();
                let key = values.next()?;
                Some((key.key_string(), values.next().unwrap_or(Value::Null)))
            })
            .collect()
    }

    /// Number of rows the statement returned (not affected by fetching).
    pub fn result_count(&self) -> usize {
        self.result_count
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Id generated by an `insert_get_id` statement.
    pub fn insert_id(&self) -> Option<&Value> {
        self.insert_id.as_ref()
    }

    pub fn has_result_set(&self) -> bool {
        self.has_result_set
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

fn insert_keyed(level: &mut IndexMap<String, Keyed>, path: &[String], row: Row) {
    match path {
        [] => {}
        [last] => {
            level.insert(last.clone(), Keyed::Row(row));
        }
        [first, rest @ ..] => {
            let slot = level
                .entry(first.clone())
                .or_insert_with(|| Keyed::Nested(IndexMap::new()));
            match slot {
                Keyed::Nested(next) => insert_keyed(next, rest, row),
                Keyed::Row(_) => {
                    let mut next = IndexMap::new();
                    insert_keyed(&mut next, rest, row);
                    *slot = Keyed::Nested(next);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt() -> Statement {
        Statement::from_result(ResultSet::rows(
            vec!["group".into(), "id".into(), "name".into()],
            vec![
                vec![Value::Text("a".into()), Value::Int(1), Value::Text("x".into())],
                vec![Value::Text("a".into()), Value::Int(2), Value::Text("y".into())],
                vec![Value::Text("b".into()), Value::Int(3), Value::Text("z".into())],
            ],
        ))
    }

    #[test]
    fn fetch_consumes_rows() {
        let mut s = stmt();
        assert_eq!(s.result_count(), 3);
        assert!(s.fetch().is_some());
        assert_eq!(s.fetch_all().len(), 2);
        assert!(s.fetch().is_none());
        assert_eq!(s.result_count(), 3);
    }

    #[test]
    fn keyed_by_nests_per_column() {
        let keyed = stmt().fetch_all_keyed_by(&["group", "id"]).unwrap();
        assert_eq!(keyed.len(), 2);
        let row = keyed["a"].get("2").and_then(Keyed::as_row).unwrap();
        assert_eq!(row.get::<String>("name").unwrap(), "y");

        let flat = stmt().fetch_all_keyed_by(&["id"]).unwrap();
        assert_eq!(flat.keys().cloned().collect::<Vec<_>>(), ["1", "2", "3"]);

        assert!(stmt().fetch_all_keyed_by(&["nope"]).is_err());
        assert!(stmt().fetch_all_keyed_by(&[]).is_err());
    }

    #[test]
    fn value_helpers() {
        let mut s = stmt();
        assert_eq!(s.value(), Some(Value::Text("a".into())));
        assert_eq!(s.values().len(), 2);

        let assoc = stmt().assoc_values();
        assert_eq!(assoc.len(), 2);
        assert_eq!(assoc["b"], Value::Int(3));
    }

    #[test]
    fn no_result_set_means_no_rows() {
        let mut s = Statement::from_result(ResultSet::affected(4));
        assert!(!s.has_result_set());
        assert_eq!(s.rows_affected(), 4);
        assert!(s.fetch().is_none());
        assert!(s.value().is_none());
    }
}
