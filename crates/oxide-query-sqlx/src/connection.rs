//! Pooled sqlx connections implementing [`Connection`].

use std::str::FromStr;

use oxide_query::{Config, Connection, ExecResult, QueryError, Result, Row, SqlValue};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Executor;
use tracing::info;

use crate::decode;

/// Binds every value to a sqlx query, in order.
macro_rules! bind_values {
    ($query:expr, $bindings:expr) => {{
        let mut query = $query;
        for value in $bindings {
            query = match value {
                SqlValue::Null => query.bind(Option::<i64>::None),
                SqlValue::Bool(b) => query.bind(*b),
                SqlValue::Int(n) => query.bind(*n),
                SqlValue::Float(f) => query.bind(*f),
                SqlValue::Text(s) => query.bind(s.as_str()),
                SqlValue::Blob(b) => query.bind(b.as_slice()),
            };
        }
        query
    }};
}

/// A connection pool for one of the supported drivers.
#[derive(Debug, Clone)]
pub enum SqlxConnection {
    /// SQLite, including `sqlite::memory:`.
    Sqlite(SqlitePool),
    /// PostgreSQL.
    Postgres(PgPool),
    /// MySQL or MariaDB.
    MySql(MySqlPool),
}

/// Opens a pool for `config`. See [`SqlxConnection::connect`].
pub async fn connect(config: &Config) -> Result<SqlxConnection> {
    SqlxConnection::connect(config).await
}

impl SqlxConnection {
    /// Opens a pool for the configured driver.
    ///
    /// `sqlite`/`sqlite3`, `pgsql`/`postgres` and `mysql` are recognized.
    /// A read-only config opens SQLite files read-only and makes every
    /// PostgreSQL or MySQL session read-only. In-memory SQLite databases
    /// are held on a single connection that never expires.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!(driver = %config.driver, name = %config.name, read_only = config.read_only, "Opening connection pool");
        match config.driver.as_str() {
            "sqlite" | "sqlite3" => {
                let options = SqliteConnectOptions::from_str(&config.dsn)
                    .map_err(QueryError::database)?
                    .create_if_missing(!config.read_only)
                    .read_only(config.read_only);
                let mut pool = SqlitePoolOptions::new();
                if is_memory(&config.dsn) {
                    pool = pool.max_connections(1).idle_timeout(None).max_lifetime(None);
                }
                let pool = pool.connect_with(options).await.map_err(QueryError::database)?;
                Ok(Self::Sqlite(pool))
            }
            "pgsql" | "postgres" | "postgresql" => {
                let mut options =
                    PgConnectOptions::from_str(&config.dsn).map_err(QueryError::database)?;
                if config.read_only {
                    options = options.options([("default_transaction_read_only", "on")]);
                }
                let pool = PgPoolOptions::new()
                    .connect_with(options)
                    .await
                    .map_err(QueryError::database)?;
                Ok(Self::Postgres(pool))
            }
            "mysql" => {
                let mut pool = MySqlPoolOptions::new();
                if config.read_only {
                    pool = pool.after_connect(|conn, _meta| {
                        Box::pin(async move {
                            conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                            Ok(())
                        })
                    });
                }
                let pool = pool.connect(&config.dsn).await.map_err(QueryError::database)?;
                Ok(Self::MySql(pool))
            }
            other => Err(QueryError::UnsupportedDriver(other.to_string())),
        }
    }

    /// The grammar name matching this pool's driver.
    pub const fn driver(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite3",
            Self::Postgres(_) => "postgres",
            Self::MySql(_) => "mysql",
        }
    }

    /// Closes the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
            Self::MySql(pool) => pool.close().await,
        }
    }
}

fn is_memory(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

impl Connection for SqlxConnection {
    async fn fetch_all(&self, sql: &str, bindings: &[SqlValue]) -> Result<Vec<Row>> {
        match self {
            Self::Sqlite(pool) => {
                let rows = bind_values!(sqlx::query(sql), bindings)
                    .fetch_all(pool)
                    .await
                    .map_err(QueryError::database)?;
                Ok(rows.iter().map(decode::sqlite_row).collect())
            }
            Self::Postgres(pool) => {
                let rows = bind_values!(sqlx::query(sql), bindings)
                    .fetch_all(pool)
                    .await
                    .map_err(QueryError::database)?;
                Ok(rows.iter().map(decode::postgres_row).collect())
            }
            Self::MySql(pool) => {
                let rows = bind_values!(sqlx::query(sql), bindings)
                    .fetch_all(pool)
                    .await
                    .map_err(QueryError::database)?;
                Ok(rows.iter().map(decode::mysql_row).collect())
            }
        }
    }

    async fn execute(&self, sql: &str, bindings: &[SqlValue]) -> Result<ExecResult> {
        match self {
            Self::Sqlite(pool) => {
                let result = bind_values!(sqlx::query(sql), bindings)
                    .execute(pool)
                    .await
                    .map_err(QueryError::database)?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: Some(result.last_insert_rowid()).filter(|id| *id > 0),
                })
            }
            // Ids come back through `returning`.
            Self::Postgres(pool) => {
                let result = bind_values!(sqlx::query(sql), bindings)
                    .execute(pool)
                    .await
                    .map_err(QueryError::database)?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: None,
                })
            }
            Self::MySql(pool) => {
                let result = bind_values!(sqlx::query(sql), bindings)
                    .execute(pool)
                    .await
                    .map_err(QueryError::database)?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: i64::try_from(result.last_insert_id())
                        .ok()
                        .filter(|id| *id > 0),
                })
            }
        }
    }
}
