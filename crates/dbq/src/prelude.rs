//! Convenient imports for typical `dbq` usage.
//!
//! ```ignore
//! use dbq::prelude::*;
//! ```

pub use crate::{
    Condition, Database, DbConfig, DbError, DbResult, Expr, FromRow, Op, Query, ReadPreference,
    Row, Statement, Value, Where, record,
};

#[cfg(feature = "postgres")]
pub use crate::PgConnector;
