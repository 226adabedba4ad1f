//! tokio-postgres adapter.
//!
//! [`PgConnector`] opens one `tokio_postgres::Client` per endpoint and spawns
//! its connection task. Bind arguments are sent in text format so the server
//! parses them into whatever type it inferred for the placeholder.

use crate::client::{Connector, DatabaseClient, DriverError, ResultSet};
use crate::config::{Endpoint, Engine};
use crate::value::Value;
use bytes::{BufMut, BytesMut};
use std::time::Duration;
use tokio_postgres::NoTls;
use tokio_postgres::types::{Format, IsNull, ToSql, Type};

/// Opens tokio-postgres clients (without TLS).
#[derive(Debug, Clone, Default)]
pub struct PgConnector {
    application_name: Option<String>,
    connect_timeout: Option<Duration>,
}

impl PgConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn config(&self, endpoint: &Endpoint) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&endpoint.host)
            .port(endpoint.port.unwrap_or(Engine::Postgres.default_port()))
            .dbname(&endpoint.database);
        if !endpoint.username.is_empty() {
            config.user(&endpoint.username);
        }
        if !endpoint.password.is_empty() {
            config.password(&endpoint.password);
        }
        if let Some(name) = &self.application_name {
            config.application_name(name);
        }
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout(timeout);
        }
        config
    }
}

impl Connector for PgConnector {
    type Client = tokio_postgres::Client;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Client, DriverError> {
        if endpoint.engine != Engine::Postgres {
            return Err(DriverError::connect(format!(
                "PgConnector cannot open a {} endpoint",
                endpoint.engine
            )));
        }

        let (client, connection) = self
            .config(endpoint)
            .connect(NoTls)
            .await
            .map_err(|e| DriverError::connect(e.to_string()))?;

        let target = endpoint.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "dbq.router", endpoint = %target, error = %e, "postgres connection closed with error");
            }
        });
        Ok(client)
    }
}

impl DatabaseClient for tokio_postgres::Client {
    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ResultSet, DriverError> {
        let stmt = self.prepare(sql).await.map_err(driver_error)?;
        let params: Vec<&(dyn ToSql + Sync)> = args.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        if stmt.columns().is_empty() {
            let affected = tokio_postgres::Client::execute(self, &stmt, &params)
                .await
                .map_err(driver_error)?;
            return Ok(ResultSet::affected(affected));
        }

        let rows = tokio_postgres::Client::query(self, &stmt, &params)
            .await
            .map_err(driver_error)?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, column) in row.columns().iter().enumerate() {
                values.push(decode(row, idx, column.type_())?);
            }
            out.push(values);
        }
        Ok(ResultSet::rows(columns, out))
    }
}

fn driver_error(err: tokio_postgres::Error) -> DriverError {
    match err.as_db_error() {
        Some(db) => DriverError::new(db.code().code(), None, db.message()),
        None => DriverError::other(err.to_string()),
    }
}

fn decode(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<Value, DriverError> {
    fn get<'a, T: tokio_postgres::types::FromSql<'a>>(
        row: &'a tokio_postgres::Row,
        idx: usize,
    ) -> Result<Option<T>, DriverError> {
        row.try_get::<_, Option<T>>(idx)
            .map_err(|e| DriverError::new("22000", None, e.to_string()))
    }

    let value = if *ty == Type::BOOL {
        get::<bool>(row, idx)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        get::<i16>(row, idx)?.map(Value::from)
    } else if *ty == Type::INT4 {
        get::<i32>(row, idx)?.map(Value::from)
    } else if *ty == Type::INT8 {
        get::<i64>(row, idx)?.map(Value::Int)
    } else if *ty == Type::OID {
        get::<u32>(row, idx)?.map(Value::from)
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, idx)?.map(Value::from)
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, idx)?.map(Value::Float)
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::UNKNOWN].contains(ty) {
        get::<String>(row, idx)?.map(Value::Text)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<serde_json::Value>(row, idx)?.map(|v| Value::Text(v.to_string()))
    } else if *ty == Type::TIMESTAMP {
        get::<chrono::NaiveDateTime>(row, idx)?.map(Value::from)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(|t| Value::Text(t.to_rfc3339()))
    } else if *ty == Type::DATE {
        get::<chrono::NaiveDate>(row, idx)?.map(Value::from)
    } else if *ty == Type::UUID {
        get::<uuid::Uuid>(row, idx)?.map(Value::from)
    } else {
        return Err(DriverError::new(
            "22000",
            None,
            format!(
                "unsupported column type {ty} at index {idx}; cast it in SQL (e.g. ::text or ::float8)"
            ),
        ));
    };
    Ok(value.unwrap_or(Value::Null))
}

impl ToSql for Value {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            other => {
                out.put_slice(other.key_string().as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    tokio_postgres::types::to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_mysql_endpoints() {
        let endpoint = Endpoint {
            engine: Engine::MySql,
            host: "localhost".into(),
            port: None,
            username: String::new(),
            password: String::new(),
            database: "app".into(),
            master_only_tables: Vec::new(),
        };
        let Err(err) = PgConnector::new().connect(&endpoint).await else {
            panic!("mysql endpoint must be rejected");
        };
        assert_eq!(err.sql_state, "08001");
    }

    #[test]
    fn values_encode_as_text() {
        let mut buf = BytesMut::new();
        let is_null = Value::Int(42).to_sql(&Type::INT8, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&buf[..], b"42");
        assert!(matches!(
            Value::Null.to_sql(&Type::TEXT, &mut BytesMut::new()).unwrap(),
            IsNull::Yes
        ));
    }
}
