//! Pooled MySQL query gateway.
//!
//! [`Database`] is a cheap-clone handle. The [`App`](crate::App) owns one and
//! the dispatcher hands a clone to every matched request, so handlers reach
//! the same pool through [`Request::db`](crate::Request::db).
//!
//! The pool is created lazily: configuring it opens no connection. Callers
//! beyond the connection ceiling wait in line for a free connection rather
//! than failing. Driver errors come back untouched as [`Error::Database`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::Json;
use sqlx::{Column, ConnectOptions, Row as _, TypeInfo};
use tracing::{debug, info};
use url::Url;

use crate::error::Error;

/// Connection ceiling of every pool.
pub const MAX_CONNECTIONS: u32 = 10;

/// How long a caller queues for a free connection. Long enough to never
/// matter in practice; the driver needs a finite deadline.
const QUEUE_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// One result row: column name to value, in select-list order.
pub type Row = serde_json::Map<String, Value>;

/// Outcome of a write statement.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub affected_rows: u64,
    pub insert_id: u64,
}

// ── DatabaseConfig ────────────────────────────────────────────────────────────

/// Where and how to connect.
///
/// `options` are passed through to the driver as connection-URL parameters
/// (`ssl-mode`, `charset`, `timezone`, …). Names the driver does not know are
/// ignored.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

fn default_host() -> String {
    "localhost".to_owned()
}

impl DatabaseConfig {
    pub fn new(user: impl Into<String>, password: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: default_host(),
            port: None,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Add a pass-through driver option.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub(crate) fn to_url(&self) -> Result<Url, Error> {
        let invalid = |what: &str| Error::Config(format!("invalid database {what}"));

        let mut url = Url::parse("mysql://localhost").map_err(|_| invalid("url"))?;
        url.set_host(Some(&self.host)).map_err(|_| invalid("host"))?;
        url.set_port(self.port).map_err(|()| invalid("port"))?;
        url.set_username(&self.user).map_err(|()| invalid("user"))?;
        url.set_password(Some(&self.password)).map_err(|()| invalid("password"))?;
        url.set_path(&self.database);

        if !self.options.is_empty() {
            let mut query = url.query_pairs_mut();
            for (name, value) in &self.options {
                match value {
                    Value::String(s) => query.append_pair(name, s),
                    other => query.append_pair(name, &other.to_string()),
                };
            }
        }
        Ok(url)
    }

    fn connect_options(&self) -> Result<MySqlConnectOptions, Error> {
        Ok(MySqlConnectOptions::from_url(&self.to_url()?)?)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("options", &self.options)
            .finish()
    }
}

// ── Database ──────────────────────────────────────────────────────────────────

/// Handle to the (possibly absent) connection pool.
#[derive(Clone, Default)]
pub struct Database {
    pool: Arc<ArcSwapOption<MySqlPool>>,
}

impl Database {
    /// Create a pool for `config` and make it the active one.
    ///
    /// A previously active pool is closed in the background once its
    /// in-flight queries have given their connections back.
    pub fn configure(&self, config: &DatabaseConfig) -> Result<(), Error> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(QUEUE_WAIT)
            .connect_lazy_with(config.connect_options()?);

        info!(host = %config.host, database = %config.database, "database pool configured");

        if let Some(old) = self.pool.swap(Some(Arc::new(pool))) {
            runtime.spawn(async move {
                old.close().await;
                debug!("replaced database pool closed");
            });
        }
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pool.load().is_some()
    }

    /// Run `sql` with positional `params` and return the result rows.
    ///
    /// A column value the driver cannot decode fails the call with
    /// [`Error::Database`].
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let pool = self.pool()?;
        let rows = bind(sqlx::query(sql), params).fetch_all(&*pool).await?;
        rows.iter().map(row_to_json).collect()
    }

    /// Run a write statement and report what it changed.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, Error> {
        let pool = self.pool()?;
        let done = bind(sqlx::query(sql), params).execute(&*pool).await?;
        Ok(ExecResult {
            affected_rows: done.rows_affected(),
            insert_id: done.last_insert_id(),
        })
    }

    /// Close the pool, waiting for checked-out connections to come back.
    ///
    /// No-op without a pool; safe to call more than once. Queries issued
    /// afterwards get the driver's pool-closed error.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.load_full() {
            pool.close().await;
            info!("database pool closed");
        }
    }

    fn pool(&self) -> Result<Arc<MySqlPool>, Error> {
        self.pool.load_full().ok_or(Error::NotConfigured)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("configured", &self.is_configured()).finish()
    }
}

// ── Parameters and rows ───────────────────────────────────────────────────────

fn bind<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(u) = n.as_u64() {
                    query.bind(u)
                } else {
                    query.bind(n.as_f64())
                }
            }
            Value::String(s) => query.bind(s.as_str()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// A column the driver cannot decode is an error, never a silent `null`.
fn row_to_json(row: &MySqlRow) -> Result<Row, Error> {
    row.columns()
        .iter()
        .map(|col| {
            let value = column_value(row, col.ordinal(), col.type_info().name())?;
            Ok((col.name().to_owned(), value))
        })
        .collect()
}

fn column_value(row: &MySqlRow, i: usize, type_name: &str) -> Result<Value, Error> {
    let value = match type_name {
        t if t.ends_with("UNSIGNED") => get::<u64>(row, i)?.map(Value::from),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            get::<i64>(row, i)?.map(Value::from)
        }
        "BOOLEAN" => get::<bool>(row, i)?.map(Value::from),
        "FLOAT" => get::<f32>(row, i)?.map(|v| Value::from(f64::from(v))),
        "DOUBLE" => get::<f64>(row, i)?.map(Value::from),
        "DATE" => get::<NaiveDate>(row, i)?.map(|v| Value::from(v.to_string())),
        "TIME" => get::<NaiveTime>(row, i)?.map(|v| Value::from(v.to_string())),
        "DATETIME" => get::<NaiveDateTime>(row, i)?.map(|v| Value::from(v.to_string())),
        "TIMESTAMP" => get::<DateTime<Utc>>(row, i)?.map(|v| Value::from(v.to_rfc3339())),
        "JSON" => get::<Json<Value>>(row, i)?.map(|v| v.0),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" | "GEOMETRY" => {
            raw(row, i)?.map(Value::from)
        }
        // DECIMAL, text and everything else travel as their wire bytes.
        _ => raw(row, i)?.map(text_or_bytes),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Typed column read; SQL `NULL` is `None`, a decode failure is an error.
fn get<T>(row: &MySqlRow, i: usize) -> Result<Option<T>, Error>
where
    T: for<'r> sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    Ok(row.try_get::<Option<T>, _>(i)?)
}

/// The column's bytes as sent, whatever its declared type.
fn raw(row: &MySqlRow, i: usize) -> Result<Option<Vec<u8>>, Error> {
    Ok(row.try_get_unchecked::<Option<Vec<u8>>, _>(i)?)
}

/// Text when the bytes are UTF-8, otherwise an array of byte values.
fn text_or_bytes(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::from(text),
        Err(e) => Value::from(e.into_bytes()),
    }
}
