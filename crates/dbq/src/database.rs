//! Database handle: configuration, connection cache and routing.
//!
//! [`Database`] replaces any process-wide registry. It owns the
//! configuration, a [`Connector`] that opens clients on demand, and a cache of
//! open clients keyed by `(host, database)`. Every statement goes through
//! [`router::decide`](crate::router::decide) to pick the read or write side.
//!
//! ```ignore
//! use dbq::prelude::*;
//!
//! let db = Database::new(PgConnector::new(), DbConfig::from_toml_str(&raw)?)?;
//! db.set_read_preference(ReadPreference::PreferMaster);
//!
//! let names = db
//!     .table("users")?
//!     .select(["name"])?
//!     .filter(Where::new().field("active", true))?
//!     .values(&db)
//!     .await?;
//! ```

use crate::client::{Connector, DatabaseClient, DriverError, ResultSet};
use crate::config::{Access, ConnectionConfig, DbConfig, Endpoint, EndpointKey, Engine, ReadPreference};
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::monitor::{MemoryQueryLog, QueryLogEntry, QueryMonitor};
use crate::query::{Operation, Query};
use crate::router::{self, Route, RouteInput};
use crate::sql::BuiltQuery;
use crate::statement::Statement;
use crate::value::Value;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::time::Instant;

/// Called with the driver error and the SQL text of a failed statement.
pub type ErrorHandler = Arc<dyn Fn(&DriverError, &str) + Send + Sync>;

/// Called when a connection to an endpoint cannot be established.
pub type ConnectErrorHandler = Arc<dyn Fn(&Endpoint, &DriverError) + Send + Sync>;

/// Rewrites every statement right before it is sent.
pub type QueryModifier = Arc<dyn Fn(&str) -> String + Send + Sync>;

struct Registry {
    config: DbConfig,
    master_only: HashMap<String, Option<Regex>>,
}

impl Registry {
    fn new(config: DbConfig) -> DbResult<Self> {
        config.validate()?;
        let master_only = config
            .connections
            .iter()
            .map(|(name, conn)| Ok((name.clone(), conn.master_only_regex()?)))
            .collect::<DbResult<_>>()?;
        Ok(Self { config, master_only })
    }
}

/// An open client plus where it points.
pub(crate) struct Connection<Cl> {
    pub(crate) client: Arc<Cl>,
    pub(crate) endpoint: Endpoint,
    pub(crate) access: Access,
    /// Logical database name.
    pub(crate) database: String,
}

/// Shared handle to all configured databases.
pub struct Database<C: Connector> {
    connector: C,
    registry: RwLock<Registry>,
    clients: Mutex<HashMap<EndpointKey, Arc<C::Client>>>,
    /// Serializes connection attempts per endpoint.
    connect_gates: Mutex<HashMap<EndpointKey, Arc<tokio::sync::Mutex<()>>>>,
    generation: AtomicU64,
    read_preference: RwLock<ReadPreference>,
    db_read_preferences: RwLock<HashMap<String, ReadPreference>>,
    error_handler: RwLock<Option<ErrorHandler>>,
    connect_error_handler: RwLock<Option<ConnectErrorHandler>>,
    query_modifier: RwLock<Option<QueryModifier>>,
    query_log_enabled: AtomicBool,
    query_log: MemoryQueryLog,
    monitors: RwLock<Vec<Arc<dyn QueryMonitor>>>,
    last_errors: Mutex<HashMap<String, DriverError>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C: Connector> Database<C> {
    /// Validate `config` and create the handle. No connection is opened yet.
    pub fn new(connector: C, config: DbConfig) -> DbResult<Self> {
        Ok(Self {
            connector,
            registry: RwLock::new(Registry::new(config)?),
            clients: Mutex::new(HashMap::new()),
            connect_gates: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            read_preference: RwLock::new(ReadPreference::Default),
            db_read_preferences: RwLock::new(HashMap::new()),
            error_handler: RwLock::new(None),
            connect_error_handler: RwLock::new(None),
            query_modifier: RwLock::new(None),
            query_log_enabled: AtomicBool::new(false),
            query_log: MemoryQueryLog::new(),
            monitors: RwLock::new(Vec::new()),
            last_errors: Mutex::new(HashMap::new()),
        })
    }

    // ==================== Configuration ====================

    /// Replace the whole configuration and drop every cached connection.
    pub fn set_config(&self, config: DbConfig) -> DbResult<()> {
        let registry = Registry::new(config)?;
        *write(&self.registry) = registry;
        self.clear_connections();
        Ok(())
    }

    /// Add or replace one named connection.
    pub fn set_db_config(&self, name: impl Into<String>, connection: ConnectionConfig) -> DbResult<()> {
        let config = self.config().with_connection(name, connection);
        self.set_config(config)
    }

    pub fn config(&self) -> DbConfig {
        read(&self.registry).config.clone()
    }

    /// Resolved settings of `db` (`None` = default) for one side.
    pub fn endpoint(&self, db: Option<&str>, access: Access) -> DbResult<Endpoint> {
        read(&self.registry).config.resolve(db, Some(access))
    }

    /// Connection string of `db` for one side.
    pub fn dsn(&self, db: Option<&str>, access: Access) -> DbResult<String> {
        Ok(self.endpoint(db, access)?.dsn())
    }

    pub(crate) fn engine(&self, db: Option<&str>) -> DbResult<Engine> {
        Ok(read(&self.registry).config.connection(db)?.1.engine)
    }

    /// Drop all cached connections; they are reopened on demand.
    pub fn clear_connections(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        lock(&self.clients).clear();
    }

    // ==================== Read preference ====================

    /// Read preference for databases without their own override.
    pub fn set_read_preference(&self, preference: ReadPreference) {
        *write(&self.read_preference) = preference;
    }

    pub fn read_preference(&self) -> ReadPreference {
        *read(&self.read_preference)
    }

    /// Override the read preference of one logical database (`None` removes the override).
    pub fn set_db_read_preference(&self, db: impl Into<String>, preference: Option<ReadPreference>) {
        let mut prefs = write(&self.db_read_preferences);
        match preference {
            Some(p) => {
                prefs.insert(db.into(), p);
            }
            None => {
                prefs.remove(&db.into());
            }
        }
    }

    /// Preference in effect for `db`.
    pub fn effective_read_preference(&self, db: &str) -> ReadPreference {
        read(&self.db_read_preferences)
            .get(db)
            .copied()
            .unwrap_or_else(|| self.read_preference())
    }

    // ==================== Hooks ====================

    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&DriverError, &str) + Send + Sync + 'static,
    {
        *write(&self.error_handler) = Some(Arc::new(handler));
    }

    pub fn set_connect_error_handler<F>(&self, handler: F)
    where
        F: Fn(&Endpoint, &DriverError) + Send + Sync + 'static,
    {
        *write(&self.connect_error_handler) = Some(Arc::new(handler));
    }

    /// Rewrite every statement before execution (e.g. to prepend a comment).
    pub fn set_query_modifier<F>(&self, modifier: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        *write(&self.query_modifier) = Some(Arc::new(modifier));
    }

    /// Turn the query log on or off; returns the previous state.
    pub fn toggle_query_log(&self, on: bool) -> bool {
        self.query_log_enabled.swap(on, Ordering::SeqCst)
    }

    pub fn query_log_enabled(&self) -> bool {
        self.query_log_enabled.load(Ordering::SeqCst)
    }

    /// Statements recorded while the query log was on.
    pub fn query_log(&self) -> &MemoryQueryLog {
        &self.query_log
    }

    /// Additional sink fed while the query log is on.
    pub fn add_query_monitor(&self, monitor: impl QueryMonitor + 'static) {
        write(&self.monitors).push(Arc::new(monitor));
    }

    /// Driver error of the most recent failed statement on `db`, cleared by
    /// the next successful one.
    pub fn last_error(&self, db: Option<&str>) -> Option<DriverError> {
        let name = self.resolve_name(db).ok()?;
        lock(&self.last_errors).get(&name).cloned()
    }

    // ==================== Queries ====================

    /// Query builder for `table` on the default database.
    pub fn table(&self, table: &str) -> DbResult<Query> {
        let engine = self.engine(None)?;
        Query::new(Dialect::from(engine), table)
    }

    /// Query builder for `table` on the named database.
    pub fn table_in(&self, db: &str, table: &str) -> DbResult<Query> {
        let engine = self.engine(Some(db))?;
        Ok(Query::new(Dialect::from(engine), table)?.on_database(db))
    }

    /// Run raw SQL. Routing is decided from the statement text.
    pub async fn query(&self, db: Option<&str>, sql: &str, args: Vec<Value>) -> DbResult<Statement> {
        self.run(db, None, BuiltQuery::new(sql, args), false).await
    }

    /// Quote a string literal using the driver of `db`.
    pub async fn quote(&self, db: Option<&str>, text: &str) -> DbResult<String> {
        let conn = self.acquire(db, Some(Operation::Select), "", false).await?;
        Ok(conn.client.quote(text))
    }

    // ==================== Internals ====================

    fn resolve_name(&self, db: Option<&str>) -> DbResult<String> {
        Ok(read(&self.registry).config.connection(db)?.0.to_string())
    }

    /// Route one statement and return a connection for it.
    pub(crate) async fn acquire(
        &self,
        db: Option<&str>,
        operation: Option<Operation>,
        sql: &str,
        force_write: bool,
    ) -> DbResult<Connection<C::Client>> {
        let (name, read_ep, write_ep, master_only) = {
            let registry = read(&self.registry);
            let (name, conn) = registry.config.connection(db)?;
            (
                name.to_string(),
                conn.resolve(Some(Access::Read)),
                conn.resolve(Some(Access::Write)),
                registry.master_only.get(name).cloned().flatten(),
            )
        };

        let route = router::decide(&RouteInput {
            operation,
            sql,
            preference: self.effective_read_preference(&name),
            master_only: master_only.as_ref(),
            last_id_functions: Dialect::from(write_ep.engine).last_id_functions(),
            force_write,
        });

        match route {
            Route::Read => self.connect(name, read_ep, Access::Read).await,
            Route::Write => self.connect(name, write_ep, Access::Write).await,
            Route::PreferWrite => {
                let same_endpoint = read_ep.key() == write_ep.key();
                match self.connect(name.clone(), write_ep, Access::Write).await {
                    Ok(conn) => Ok(conn),
                    Err(err) if same_endpoint => Err(err),
                    Err(err) => {
                        tracing::warn!(
                            target: "dbq.router",
                            database = %name,
                            error = %err,
                            "write endpoint unavailable, reading from replica"
                        );
                        self.connect(name, read_ep, Access::Read).await
                    }
                }
            }
        }
    }

    fn cached(&self, key: &EndpointKey) -> Option<Arc<C::Client>> {
        lock(&self.clients).get(key).cloned()
    }

    async fn connect(
        &self,
        database: String,
        endpoint: Endpoint,
        access: Access,
    ) -> DbResult<Connection<C::Client>> {
        let key = endpoint.key();
        let client = match self.cached(&key) {
            Some(client) => client,
            None => {
                let gate = Arc::clone(lock(&self.connect_gates).entry(key.clone()).or_default());
                let _guard = gate.lock().await;
                match self.cached(&key) {
                    Some(client) => client,
                    None => self.open(&endpoint, key).await?,
                }
            }
        };
        Ok(Connection {
            client,
            endpoint,
            access,
            database,
        })
    }

    async fn open(&self, endpoint: &Endpoint, key: EndpointKey) -> DbResult<Arc<C::Client>> {
        let generation = self.generation.load(Ordering::SeqCst);
        match self.connector.connect(endpoint).await {
            Ok(client) => {
                let client = Arc::new(client);
                if self.generation.load(Ordering::SeqCst) == generation {
                    lock(&self.clients).insert(key, Arc::clone(&client));
                }
                tracing::debug!(target: "dbq.router", %endpoint, "connected");
                Ok(client)
            }
            Err(source) => {
                let handler = read(&self.connect_error_handler).clone();
                if let Some(handler) = handler {
                    handler(endpoint, &source);
                }
                tracing::error!(target: "dbq.router", %endpoint, error = %source, "connection failed");
                Err(DbError::Connection {
                    endpoint: endpoint.to_string(),
                    source,
                })
            }
        }
    }

    /// Execute on an already acquired connection.
    pub(crate) async fn run_on(
        &self,
        conn: &Connection<C::Client>,
        built: &BuiltQuery,
    ) -> DbResult<ResultSet> {
        let modifier = read(&self.query_modifier).clone();
        let sql = match modifier {
            Some(modify) => modify(&built.sql),
            None => built.sql.clone(),
        };

        let start = Instant::now();
        let result = conn.client.execute(&sql, &built.args).await;
        let elapsed = start.elapsed();

        let (success, rows_affected) = match &result {
            Ok(rs) => (true, rs.rows_affected),
            Err(_) => (false, 0),
        };
        if self.query_log_enabled() {
            let entry = QueryLogEntry {
                engine: conn.endpoint.engine,
                database: conn.database.clone(),
                sql: sql.clone(),
                success,
                elapsed,
                rows_affected,
            };
            let monitors = read(&self.monitors).clone();
            for monitor in &monitors {
                monitor.on_query(&entry);
            }
            self.query_log.record(entry);
        }

        match result {
            Ok(rs) => {
                tracing::debug!(
                    target: "dbq.sql",
                    engine = %conn.endpoint.engine,
                    database = %conn.database,
                    access = %conn.access,
                    elapsed_us = elapsed.as_micros() as u64,
                    rows_affected,
                    sql = %sql,
                    "statement executed"
                );
                lock(&self.last_errors).remove(&conn.database);
                Ok(rs)
            }
            Err(source) => {
                tracing::warn!(
                    target: "dbq.sql",
                    engine = %conn.endpoint.engine,
                    database = %conn.database,
                    access = %conn.access,
                    error = %source,
                    sql = %sql,
                    "statement failed"
                );
                lock(&self.last_errors).insert(conn.database.clone(), source.clone());
                let handler = read(&self.error_handler).clone();
                if let Some(handler) = handler {
                    handler(&source, &sql);
                }
                Err(DbError::Execution { source, sql })
            }
        }
    }

    /// Route and execute one statement.
    pub(crate) async fn run(
        &self,
        db: Option<&str>,
        operation: Option<Operation>,
        built: BuiltQuery,
        force_write: bool,
    ) -> DbResult<Statement> {
        if built.is_empty() {
            return Err(DbError::EmptyStatement);
        }
        let conn = self.acquire(db, operation, &built.sql, force_write).await?;
        let rs = self.run_on(&conn, &built).await?;
        Ok(Statement::from_result(rs))
    }
}
