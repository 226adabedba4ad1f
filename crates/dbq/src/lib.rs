//! # dbq
//!
//! A cross-dialect (MySQL / PostgreSQL) SQL query builder with read/write
//! connection routing.
//!
//! ## Features
//!
//! - **Injection-safe values**: text always travels as a bind argument; numbers, booleans and NULL are inlined
//! - **One builder, two dialects**: quoting, placeholders, regex operators and id retrieval follow the [`Dialect`]
//! - **Batch helpers**: chunked multi-row inserts, upserts and `CASE`-based column updates
//! - **Replica routing**: SELECTs go to the read endpoint unless the read preference, a master-only table or a last-id function says otherwise
//! - **Query log**: in-memory log and `tracing` sink while the log is toggled on
//!
//! ## Example
//!
//! ```ignore
//! use dbq::prelude::*;
//!
//! let db = Database::new(PgConnector::new(), DbConfig::from_toml_str(&raw)?)?;
//!
//! db.table("users")?
//!     .update(record([("status", "inactive")]))?
//!     .filter(Condition::lt("last_seen", "2024-01-01"))?
//!     .execute(&db)
//!     .await?;
//!
//! let active = db
//!     .table("users")?
//!     .select(["id", "name"])?
//!     .filter(Where::new().field("status", "active"))?
//!     .order([("name", "ASC")])?
//!     .fetch_all(&db)
//!     .await?;
//! ```

pub mod client;
pub mod condition;
pub mod config;
pub mod database;
pub mod dialect;
pub mod error;
pub mod ident;
pub mod monitor;
pub mod prelude;
pub mod query;
pub mod router;
pub mod row;
pub mod sql;
pub mod statement;
pub mod value;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use client::{Connector, DatabaseClient, DriverError, ResultSet};
pub use condition::{Condition, Expr, Op, Rhs, Where};
pub use config::{Access, ConnectionConfig, DbConfig, Endpoint, EndpointOverride, Engine, ReadPreference};
pub use database::Database;
pub use dialect::Dialect;
pub use error::{DbError, DbResult};
pub use monitor::{MemoryQueryLog, QueryLogEntry, QueryMonitor, TracingQueryLog};
pub use query::{BatchResult, Operation, ProcessInfo, Query, Record, record};
pub use row::{FromRow, FromValue, Row};
pub use sql::{BuiltQuery, SqlBuf};
pub use statement::{Keyed, Statement};
pub use value::Value;

#[cfg(feature = "postgres")]
pub use postgres::PgConnector;
