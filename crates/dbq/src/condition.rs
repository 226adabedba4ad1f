//! WHERE-clause primitives.
//!
//! - [`Op`]: the closed set of comparison operators and their negations
//! - [`Condition`]: one `(field, operator, value)` clause
//! - [`Expr`]: explicit AND / OR trees of conditions
//! - [`Where`]: everything `filter()` / `filter_not()` / `delete()` accept
//!
//! # Example
//! ```ignore
//! use dbq::{Condition, Expr, Op, Where};
//!
//! // field map: `status` = 'active' AND `kind` IN ('a','b')
//! let w = Where::new().field("status", "active").field("kind", ["a", "b"]);
//!
//! // triples
//! let w = Where::from(vec![
//!     Condition::new("id", Op::Gt, 100),
//!     Condition::new("id", Op::Lt, 200),
//! ]);
//!
//! // (a = 1 OR b = 2) AND c != 3
//! let e = Expr::and([
//!     Expr::or([Condition::eq("a", 1).into(), Condition::eq("b", 2).into()]),
//!     Condition::ne("c", 3).into(),
//! ]);
//! ```

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::ident::quote_ident;
use crate::sql::{BuiltQuery, SqlBuf};
use crate::value::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    LikeBinary,
    NotLikeBinary,
    Regexp,
    NotRegexp,
    Between,
    NotBetween,
    /// Full-text match. Has no negation.
    Match,
}

impl Op {
    pub const ALL: [Op; 15] = [
        Op::Eq,
        Op::Ne,
        Op::Lt,
        Op::Lte,
        Op::Gt,
        Op::Gte,
        Op::Like,
        Op::NotLike,
        Op::LikeBinary,
        Op::NotLikeBinary,
        Op::Regexp,
        Op::NotRegexp,
        Op::Between,
        Op::NotBetween,
        Op::Match,
    ];

    /// Canonical operator token (`=`, `NOT LIKE`, `BETWEEN`, ...).
    pub fn token(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Like => "LIKE",
            Op::NotLike => "NOT LIKE",
            Op::LikeBinary => "LIKE BINARY",
            Op::NotLikeBinary => "NOT LIKE BINARY",
            Op::Regexp => "REGEXP",
            Op::NotRegexp => "NOT REGEXP",
            Op::Between => "BETWEEN",
            Op::NotBetween => "NOT BETWEEN",
            Op::Match => "MATCH",
        }
    }

    /// Operator as rendered for `dialect`.
    pub fn as_sql(self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (Op::Regexp, d) => d.regexp_operator(),
            (Op::NotRegexp, d) => d.not_regexp_operator(),
            (Op::LikeBinary, Dialect::Postgres) => "LIKE",
            (Op::NotLikeBinary, Dialect::Postgres) => "NOT LIKE",
            (Op::Match, Dialect::Postgres) => "@@",
            (op, _) => op.token(),
        }
    }

    /// The logical complement of this operator.
    pub fn negate(self) -> DbResult<Op> {
        Ok(match self {
            Op::Eq => Op::Ne,
            Op::Ne => Op::Eq,
            Op::Lt => Op::Gte,
            Op::Gte => Op::Lt,
            Op::Lte => Op::Gt,
            Op::Gt => Op::Lte,
            Op::Like => Op::NotLike,
            Op::NotLike => Op::Like,
            Op::LikeBinary => Op::NotLikeBinary,
            Op::NotLikeBinary => Op::LikeBinary,
            Op::Regexp => Op::NotRegexp,
            Op::NotRegexp => Op::Regexp,
            Op::Between => Op::NotBetween,
            Op::NotBetween => Op::Between,
            Op::Match => return Err(DbError::NotNegatable(self.token().to_string())),
        })
    }

    fn is_equality(self) -> bool {
        matches!(self, Op::Eq | Op::Ne)
    }

    fn is_range(self) -> bool {
        matches!(self, Op::Between | Op::NotBetween)
    }
}

impl FromStr for Op {
    type Err = DbError;

    fn from_str(s: &str) -> DbResult<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        Op::ALL
            .into_iter()
            .find(|op| op.token().eq_ignore_ascii_case(&normalized))
            .or_else(|| (normalized == "<>").then_some(Op::Ne))
            .ok_or_else(|| DbError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Right-hand side of a condition: a single value or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    One(Value),
    List(Vec<Value>),
}

impl Rhs {
    pub fn list<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Rhs::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for Rhs {
    fn from(v: Value) -> Self {
        Rhs::One(v)
    }
}

impl From<Vec<Value>> for Rhs {
    fn from(v: Vec<Value>) -> Self {
        Rhs::List(v)
    }
}

impl<const N: usize> From<[Value; N]> for Rhs {
    fn from(v: [Value; N]) -> Self {
        Rhs::List(v.into())
    }
}

macro_rules! impl_rhs_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Rhs {
                fn from(v: $t) -> Self {
                    Rhs::One(v.into())
                }
            }

            impl From<Option<$t>> for Rhs {
                fn from(v: Option<$t>) -> Self {
                    Rhs::One(v.into())
                }
            }

            impl From<Vec<$t>> for Rhs {
                fn from(v: Vec<$t>) -> Self {
                    Rhs::list(v)
                }
            }

            impl<const N: usize> From<[$t; N]> for Rhs {
                fn from(v: [$t; N]) -> Self {
                    Rhs::list(v)
                }
            }
        )*
    };
}

impl_rhs_from!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    &str,
    String,
    uuid::Uuid,
    chrono::NaiveDate,
    chrono::NaiveDateTime
);

/// A single `(field, operator, value)` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    op: Op,
    rhs: Rhs,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Op, rhs: impl Into<Rhs>) -> Self {
        Self {
            field: field.into(),
            op,
            rhs: rhs.into(),
        }
    }

    /// Build from an operator token such as `">="` or `"not like"`.
    pub fn parse(field: impl Into<String>, op: &str, rhs: impl Into<Rhs>) -> DbResult<Self> {
        Ok(Self::new(field, op.parse()?, rhs))
    }

    pub fn eq(field: impl Into<String>, rhs: impl Into<Rhs>) -> Self {
        Self::new(field, Op::Eq, rhs)
    }

    pub fn ne(field: impl Into<String>, rhs: impl Into<Rhs>) -> Self {
        Self::new(field, Op::Ne, rhs)
    }

    pub fn lt(field: impl Into<String>, rhs: impl Into<Rhs>) -> Self {
        Self::new(field, Op::Lt, rhs)
    }

    pub fn lte(field: impl Into<String>, rhs: impl Into<Rhs>) -> Self {
        Self::new(field, Op::Lte, rhs)
    }

    pub fn gt(field: impl Into<String>, rhs: impl Into<Rhs>) -> Self {
        Self::new(field, Op::Gt, rhs)
    }

    pub fn gte(field: impl Into<String>, rhs: impl Into<Rhs>) -> Self {
        Self::new(field, Op::Gte, rhs)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::new(field, Op::Like, Rhs::One(pattern.into()))
    }

    pub fn between(field: impl Into<String>, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        Self::new(field, Op::Between, Rhs::List(vec![min.into(), max.into()]))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn rhs(&self) -> &Rhs {
        &self.rhs
    }

    /// Same field and value with the complementary operator.
    pub fn negate(&self) -> DbResult<Self> {
        Ok(Self {
            field: self.field.clone(),
            op: self.op.negate()?,
            rhs: self.rhs.clone(),
        })
    }

    /// Render this condition on its own.
    pub fn build(&self, dialect: Dialect, always_quote: bool) -> DbResult<BuiltQuery> {
        let mut buf = SqlBuf::empty();
        self.append_to(&mut buf, dialect, always_quote)?;
        Ok(buf.build(dialect))
    }

    /// Append this condition to `buf`. Nothing is appended on error.
    pub fn append_to(&self, buf: &mut SqlBuf, dialect: Dialect, always_quote: bool) -> DbResult<()> {
        let field = quote_ident(dialect, &self.field)?;
        let op = self.op;

        match &self.rhs {
            Rhs::List(values) if op.is_equality() => {
                let values = dedup_values(values);
                if values.is_empty() {
                    buf.push(if op == Op::Eq { "1=0" } else { "1=1" });
                    return Ok(());
                }
                buf.push(&field);
                buf.push(if op == Op::Ne { " NOT IN (" } else { " IN (" });
                buf.push_value_list(values, always_quote);
                buf.push(")");
            }
            Rhs::List(values) if op.is_range() => {
                let [min, max] = values.as_slice() else {
                    return Err(DbError::InvalidArity(format!(
                        "{op} operator requires exactly 2 values, found {}",
                        values.len()
                    )));
                };
                buf.push(&format!("{field} {} ", op.as_sql(dialect)));
                buf.push_value(min, always_quote);
                buf.push(" AND ");
                buf.push_value(max, always_quote);
            }
            Rhs::List(_) => {
                return Err(DbError::InvalidValueType(format!(
                    "list value is not allowed with operator {op}"
                )));
            }
            Rhs::One(_) if op.is_range() => {
                return Err(DbError::InvalidArity(format!(
                    "{op} operator requires exactly 2 values, found 1"
                )));
            }
            Rhs::One(Value::Null) if op.is_equality() => {
                let is = if op == Op::Ne { "IS NOT" } else { "IS" };
                buf.push(&format!("{field} {is} NULL"));
            }
            Rhs::One(value) => {
                buf.push(&format!("{field} {} ", op.as_sql(dialect)));
                buf.push_value(value, always_quote);
            }
        }
        Ok(())
    }
}

impl<F: Into<String>, R: Into<Rhs>> From<(F, Op, R)> for Condition {
    fn from((field, op, rhs): (F, Op, R)) -> Self {
        Condition::new(field, op, rhs)
    }
}

/// Keep the first occurrence of each value, preserving order.
fn dedup_values(values: &[Value]) -> Vec<&Value> {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().filter(|v| seen.insert(v.dedup_key())).collect()
}

/// Boolean expression over conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Cond(Condition),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    /// Trusted SQL, inserted verbatim.
    Raw(String),
}

impl Expr {
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Or(exprs.into_iter().collect())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Logical negation, pushed down to the leaves (De Morgan).
    pub fn negate(&self) -> DbResult<Expr> {
        Ok(match self {
            Expr::Cond(c) => Expr::Cond(c.negate()?),
            Expr::And(items) => Expr::Or(items.iter().map(Expr::negate).collect::<DbResult<_>>()?),
            Expr::Or(items) => Expr::And(items.iter().map(Expr::negate).collect::<DbResult<_>>()?),
            Expr::Raw(sql) => Expr::Raw(format!("NOT ({sql})")),
        })
    }

    pub fn append_to(&self, buf: &mut SqlBuf, dialect: Dialect, always_quote: bool) -> DbResult<()> {
        match self {
            Expr::Cond(c) => c.append_to(buf, dialect, always_quote),
            Expr::Raw(sql) => {
                buf.push(sql);
                Ok(())
            }
            Expr::And(items) if items.is_empty() => {
                buf.push("1=1");
                Ok(())
            }
            Expr::Or(items) if items.is_empty() => {
                buf.push("1=0");
                Ok(())
            }
            Expr::And(items) => {
                let mut part = SqlBuf::empty();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        part.push(" AND ");
                    }
                    item.append_to(&mut part, dialect, always_quote)?;
                }
                buf.push_sql(part);
                Ok(())
            }
            Expr::Or(items) => {
                let mut part = SqlBuf::new("(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        part.push(" OR ");
                    }
                    let nested_and = matches!(item, Expr::And(inner) if inner.len() > 1);
                    if nested_and {
                        part.push("(");
                    }
                    item.append_to(&mut part, dialect, always_quote)?;
                    if nested_and {
                        part.push(")");
                    }
                }
                part.push(")");
                buf.push_sql(part);
                Ok(())
            }
        }
    }
}

impl From<Condition> for Expr {
    fn from(c: Condition) -> Self {
        Expr::Cond(c)
    }
}

/// Input accepted by `filter`, `filter_not` and `delete`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Where {
    /// Nothing to apply.
    #[default]
    Empty,
    /// Field map: AND of equalities (`IN` for lists).
    Fields(Vec<(String, Rhs)>),
    /// AND of explicit conditions.
    Conditions(Vec<Condition>),
    /// `(field, operator token, value)` triples, operator parsed when applied.
    Triples(Vec<(String, String, Rhs)>),
    Expr(Expr),
}

impl Where {
    pub fn new() -> Self {
        Where::Empty
    }

    /// Field map from `(name, value)` pairs.
    pub fn fields<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Rhs>,
    {
        Where::Fields(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Add one equality to a field map.
    pub fn field(self, name: impl Into<String>, rhs: impl Into<Rhs>) -> Self {
        let mut pairs = match self {
            Where::Fields(pairs) => pairs,
            _ => Vec::new(),
        };
        pairs.push((name.into(), rhs.into()));
        Where::Fields(pairs)
    }

    /// One `(field, operator, value)` triple.
    pub fn triple(field: impl Into<String>, op: impl Into<String>, rhs: impl Into<Rhs>) -> Self {
        Where::Triples(vec![(field.into(), op.into(), rhs.into())])
    }

    /// Interpret loosely-typed JSON input.
    ///
    /// - an object is a field map
    /// - an array of arrays is a list of `[field, op, value]` triples
    /// - a flat array is a single triple
    pub fn from_json(input: &serde_json::Value) -> DbResult<Self> {
        match input {
            serde_json::Value::Null => Ok(Where::Empty),
            serde_json::Value::Object(map) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (field, value) in map {
                    pairs.push((field.clone(), json_rhs(value)?));
                }
                Ok(Where::Fields(pairs))
            }
            serde_json::Value::Array(items) if items.is_empty() => Ok(Where::Empty),
            serde_json::Value::Array(items) => {
                if items.first().is_some_and(serde_json::Value::is_array) {
                    let triples = items
                        .iter()
                        .map(json_triple)
                        .collect::<DbResult<Vec<_>>>()?;
                    Ok(Where::Triples(triples))
                } else {
                    Ok(Where::Triples(vec![json_triple(input)?]))
                }
            }
            other => Err(DbError::invalid_argument(format!(
                "where input must be an object or an array, found {other}"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Where::Empty => true,
            Where::Fields(v) => v.is_empty(),
            Where::Conditions(v) => v.is_empty(),
            Where::Triples(v) => v.is_empty(),
            Where::Expr(_) => false,
        }
    }

    /// Flatten into conditions, negating every operator when `negate` is set.
    ///
    /// Returns `None` for empty input.
    pub(crate) fn into_expr(self, negate: bool) -> DbResult<Option<Expr>> {
        if self.is_empty() {
            return Ok(None);
        }
        let expr = match self {
            Where::Empty => return Ok(None),
            Where::Fields(pairs) => Expr::And(
                pairs
                    .into_iter()
                    .map(|(field, rhs)| {
                        let op = if negate { Op::Ne } else { Op::Eq };
                        Expr::Cond(Condition::new(field, op, rhs))
                    })
                    .collect(),
            ),
            Where::Conditions(conds) => Expr::And(
                conds
                    .into_iter()
                    .map(|c| if negate { c.negate() } else { Ok(c) })
                    .map(|c| c.map(Expr::Cond))
                    .collect::<DbResult<_>>()?,
            ),
            Where::Triples(triples) => Expr::And(
                triples
                    .into_iter()
                    .map(|(field, op, rhs)| {
                        let mut op: Op = op.parse()?;
                        if negate {
                            op = op.negate()?;
                        }
                        Ok(Expr::Cond(Condition::new(field, op, rhs)))
                    })
                    .collect::<DbResult<_>>()?,
            ),
            Where::Expr(expr) if negate => expr.negate()?,
            Where::Expr(expr) => expr,
        };
        Ok(Some(expr))
    }
}

fn json_rhs(value: &serde_json::Value) -> DbResult<Rhs> {
    match value {
        serde_json::Value::Array(items) => Ok(Rhs::List(
            items
                .iter()
                .cloned()
                .map(Value::try_from)
                .collect::<DbResult<_>>()?,
        )),
        other => Ok(Rhs::One(Value::try_from(other.clone())?)),
    }
}

fn json_triple(value: &serde_json::Value) -> DbResult<(String, String, Rhs)> {
    let serde_json::Value::Array(parts) = value else {
        return Err(DbError::invalid_argument(format!(
            "condition must be a [field, operator, value] array, found {value}"
        )));
    };
    match parts.as_slice() {
        [serde_json::Value::String(field), serde_json::Value::String(op), rhs] => {
            Ok((field.clone(), op.clone(), json_rhs(rhs)?))
        }
        _ => Err(DbError::InvalidArity(format!(
            "condition must be a [field, operator, value] array, found {value}"
        ))),
    }
}

impl From<Condition> for Where {
    fn from(c: Condition) -> Self {
        Where::Conditions(vec![c])
    }
}

impl From<Vec<Condition>> for Where {
    fn from(c: Vec<Condition>) -> Self {
        Where::Conditions(c)
    }
}

impl<const N: usize> From<[Condition; N]> for Where {
    fn from(c: [Condition; N]) -> Self {
        Where::Conditions(c.into())
    }
}

impl From<Expr> for Where {
    fn from(e: Expr) -> Self {
        Where::Expr(e)
    }
}

impl From<crate::query::Record> for Where {
    fn from(record: crate::query::Record) -> Self {
        Where::Fields(record.into_iter().map(|(k, v)| (k, Rhs::One(v))).collect())
    }
}

impl<F, O, R> From<(F, O, R)> for Where
where
    F: Into<String>,
    O: AsRef<str>,
    R: Into<Rhs>,
{
    fn from((field, op, rhs): (F, O, R)) -> Self {
        Where::Triples(vec![(field.into(), op.as_ref().to_string(), rhs.into())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(c: &Condition, dialect: Dialect) -> BuiltQuery {
        c.build(dialect, false).unwrap()
    }

    #[test]
    fn negation_is_an_involution() {
        for op in Op::ALL {
            match op.negate() {
                Ok(n) => assert_eq!(n.negate().unwrap(), op, "{op}"),
                Err(e) => {
                    assert_eq!(op, Op::Match);
                    assert!(matches!(e, DbError::NotNegatable(_)));
                }
            }
        }
    }

    #[test]
    fn operator_parsing() {
        assert_eq!("not  like".parse::<Op>().unwrap(), Op::NotLike);
        assert_eq!("LIKE BINARY".parse::<Op>().unwrap(), Op::LikeBinary);
        assert_eq!("<>".parse::<Op>().unwrap(), Op::Ne);
        assert!(matches!(
            "~~".parse::<Op>(),
            Err(DbError::UnknownOperator(_))
        ));
    }

    #[test]
    fn list_equality_becomes_in_with_dedup() {
        let c = Condition::eq("field", [1, 2, 2, 3]);
        let q = render(&c, Dialect::MySql);
        assert_eq!(q.sql, "`field` IN (1,2,3)");
        assert!(q.args.is_empty());

        let c = Condition::ne("field", vec!["b", "a", "b"]);
        let q = render(&c, Dialect::Postgres);
        assert_eq!(q.sql, "\"field\" NOT IN ($1,$2)");
        assert_eq!(q.args, vec![Value::from("b"), Value::from("a")]);
    }

    #[test]
    fn empty_lists_short_circuit() {
        assert_eq!(render(&Condition::eq("f", Vec::<i32>::new()), Dialect::MySql).sql, "1=0");
        assert_eq!(render(&Condition::ne("f", Vec::<i32>::new()), Dialect::MySql).sql, "1=1");
    }

    #[test]
    fn null_equality_uses_is() {
        assert_eq!(render(&Condition::eq("f", Value::Null), Dialect::MySql).sql, "`f` IS NULL");
        assert_eq!(
            render(&Condition::ne("f", Value::Null), Dialect::MySql).sql,
            "`f` IS NOT NULL"
        );
    }

    #[test]
    fn between_requires_two_values() {
        let ok = Condition::between("age", 18, 30);
        assert_eq!(render(&ok, Dialect::MySql).sql, "`age` BETWEEN 18 AND 30");

        let bad = Condition::new("age", Op::Between, [1, 2, 3]);
        assert!(matches!(
            bad.build(Dialect::MySql, false),
            Err(DbError::InvalidArity(_))
        ));
        let bad = Condition::new("age", Op::NotBetween, 5);
        assert!(matches!(
            bad.build(Dialect::MySql, false),
            Err(DbError::InvalidArity(_))
        ));
    }

    #[test]
    fn list_with_range_operator_is_rejected() {
        let bad = Condition::new("age", Op::Gt, [1, 2]);
        assert!(matches!(
            bad.build(Dialect::MySql, false),
            Err(DbError::InvalidValueType(_))
        ));
    }

    #[test]
    fn dialect_specific_operators() {
        let c = Condition::new("name", Op::Regexp, "^a");
        assert_eq!(render(&c, Dialect::MySql).sql, "`name` REGEXP ?");
        assert_eq!(render(&c, Dialect::Postgres).sql, "\"name\" ~ $1");

        let c = Condition::new("name", Op::NotRegexp, "^a");
        assert_eq!(render(&c, Dialect::Postgres).sql, "\"name\" !~ $1");

        let c = Condition::new("name", Op::LikeBinary, "A%");
        assert_eq!(render(&c, Dialect::MySql).sql, "`name` LIKE BINARY ?");
        assert_eq!(render(&c, Dialect::Postgres).sql, "\"name\" LIKE $1");
    }

    #[test]
    fn strings_never_inline() {
        let payload = "'; DROP TABLE users; --";
        let q = render(&Condition::like("name", payload), Dialect::MySql);
        assert!(!q.sql.contains(payload));
        assert_eq!(q.args, vec![Value::from(payload)]);
    }

    #[test]
    fn expr_renders_and_or_groups() {
        let e = Expr::and([
            Expr::or([Condition::eq("a", 1).into(), Condition::eq("b", 2).into()]),
            Condition::ne("c", 3).into(),
        ]);
        let mut buf = SqlBuf::empty();
        e.append_to(&mut buf, Dialect::MySql, false).unwrap();
        assert_eq!(buf.to_sql(Dialect::MySql), "(`a` = 1 OR `b` = 2) AND `c` != 3");
    }

    #[test]
    fn expr_negation_applies_de_morgan() {
        let e = Expr::or([Condition::eq("a", 1).into(), Condition::gt("b", 2).into()]);
        let mut buf = SqlBuf::empty();
        e.negate()
            .unwrap()
            .append_to(&mut buf, Dialect::MySql, false)
            .unwrap();
        assert_eq!(buf.to_sql(Dialect::MySql), "`a` != 1 AND `b` <= 2");

        let with_match = Expr::and([Condition::new("body", Op::Match, "x").into()]);
        assert!(with_match.negate().is_err());
    }

    #[test]
    fn json_object_is_a_field_map() {
        let w = Where::from_json(&serde_json::json!({"id": 10})).unwrap();
        assert_eq!(w, Where::Fields(vec![("id".into(), Rhs::One(Value::Int(10)))]));
    }

    #[test]
    fn json_flat_array_is_one_triple() {
        let w = Where::from_json(&serde_json::json!(["id", ">", 99])).unwrap();
        assert_eq!(
            w,
            Where::Triples(vec![("id".into(), ">".into(), Rhs::One(Value::Int(99)))])
        );
    }

    #[test]
    fn json_nested_array_is_a_triple_list() {
        let w = Where::from_json(&serde_json::json!([["id", ">", 100], ["id", "<", 200]])).unwrap();
        let Where::Triples(t) = w else {
            panic!("expected triples");
        };
        assert_eq!(t.len(), 2);
        assert_eq!(t[1].1, "<");
    }

    #[test]
    fn json_single_entry_map_is_not_a_triple() {
        let w = Where::from_json(&serde_json::json!({"0": "id"})).unwrap();
        assert!(matches!(w, Where::Fields(_)));
    }

    #[test]
    fn json_scalar_is_rejected() {
        assert!(Where::from_json(&serde_json::json!("id = 1")).is_err());
        assert!(Where::from_json(&serde_json::json!(["id", ">"])).is_err());
        assert!(Where::from_json(&serde_json::json!([])).unwrap().is_empty());
    }
}
