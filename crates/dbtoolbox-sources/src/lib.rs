//! Database sources.
//!
//! A [`Source`] owns the connection pool for one entry of the tools file's
//! `sources:` map and knows how to run a statement against it: bind the
//! resolved parameters, execute, and materialize the rows as JSON objects.

pub mod bind;
pub mod error;
pub mod interpolate;
pub mod mssql;
pub mod rows;

pub use error::SourceError;
pub use rows::JsonRow;

use dbtoolbox_core::ParamValues;
use dbtoolbox_core::config::{
    ConnectionPoolConfig, MySqlConfig, PostgresConfig, SourceConfig, SourceKind, SqliteConfig,
    SslMode,
};
use error::Result;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

enum Pool {
    Postgres(PgPool),
    MySql {
        pool: MySqlPool,
        query_timeout: Option<Duration>,
    },
    /// MindsDB: MySQL protocol, literal interpolation, text protocol only.
    MindsDb(MySqlPool),
    MsSql(mssql::MsSqlPool),
    Sqlite(SqlitePool),
}

/// A connected source.
pub struct Source {
    name: String,
    kind: SourceKind,
    pool: Pool,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

fn pool_settings(pool: Option<&ConnectionPoolConfig>) -> ConnectionPoolConfig {
    pool.cloned().unwrap_or_default()
}

fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow => PgSslMode::Allow,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

fn mysql_options(config: &MySqlConfig, port: u16) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(port)
        .database(&config.database)
        .username(&config.user);
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    options
}

impl Source {
    /// Open the pool for `config` and verify that a connection can be made.
    pub async fn connect(name: &str, config: &SourceConfig) -> Result<Self> {
        let connect_err = |error: sqlx::Error| SourceError::Connect {
            name: name.to_string(),
            error: Box::new(error),
        };
        let port = config.port().unwrap_or_default();

        let pool = match config {
            SourceConfig::Postgres(pg) => {
                Pool::Postgres(connect_postgres(pg, port).await.map_err(connect_err)?)
            }
            SourceConfig::MySql(c) | SourceConfig::Tidb(c) => {
                let query_timeout = c.query_timeout().map_err(|message| SourceError::Config {
                    name: name.to_string(),
                    message,
                })?;
                let mut options = mysql_options(c, port);
                if c.ssl {
                    options = options.ssl_mode(MySqlSslMode::Required);
                }
                let settings = pool_settings(c.pool.as_ref());
                let pool = MySqlPoolOptions::new()
                    .min_connections(settings.min_connections)
                    .max_connections(settings.max_connections)
                    .acquire_timeout(Duration::from_secs(settings.acquire_timeout_seconds))
                    .connect_with(options)
                    .await
                    .map_err(connect_err)?;
                Pool::MySql { pool, query_timeout }
            }
            SourceConfig::MindsDb(c) => {
                // MindsDB rejects most of the session setup sqlx sends by default.
                let options = mysql_options(c, port)
                    .pipes_as_concat(false)
                    .no_engine_substitution(false)
                    .timezone(Option::<String>::None)
                    .statement_cache_capacity(0);
                let settings = pool_settings(c.pool.as_ref());
                let pool = MySqlPoolOptions::new()
                    .min_connections(settings.min_connections)
                    .max_connections(settings.max_connections)
                    .acquire_timeout(Duration::from_secs(settings.acquire_timeout_seconds))
                    .connect_with(options)
                    .await
                    .map_err(connect_err)?;
                Pool::MindsDb(pool)
            }
            SourceConfig::MsSql(c) => {
                let settings = pool_settings(c.pool.as_ref());
                let pool = mssql::create_pool(name, mssql::client_config(c, port), &settings)?;
                // Fail at startup, as the sqlx pools do, rather than on the first query.
                pool.get().await.map_err(|e| SourceError::Connect {
                    name: name.to_string(),
                    error: Box::new(mssql::acquire_error(e)),
                })?;
                Pool::MsSql(pool)
            }
            SourceConfig::Sqlite(c) => Pool::Sqlite(connect_sqlite(c).await.map_err(connect_err)?),
        };

        tracing::info!(source = %name, kind = %config.kind(), "Source connected");

        Ok(Self {
            name: name.to_string(),
            kind: config.kind(),
            pool,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Run a fixed statement with positional parameters.
    ///
    /// Placeholders are `$n` on Postgres, `@Pn` on SQL Server and `?`
    /// everywhere else. MindsDB statements have their placeholders replaced
    /// with literals first.
    pub async fn query(&self, statement: &str, params: &ParamValues) -> Result<Vec<JsonRow>> {
        tracing::debug!(source = %self.name, statement, params = params.len(), "Running statement");

        match &self.pool {
            Pool::Postgres(pool) => {
                let args = bind::pg_arguments(params)?;
                let rows = sqlx::query_with(statement, args).fetch_all(pool).await?;
                rows.iter().map(rows::pg_row_to_json).collect()
            }
            Pool::MySql { pool, query_timeout } => {
                let args = bind::mysql_arguments(params)?;
                let rows = with_timeout(*query_timeout, sqlx::query_with(statement, args).fetch_all(pool)).await?;
                rows.iter().map(rows::mysql_row_to_json).collect()
            }
            Pool::MindsDb(pool) => {
                let sql = interpolate::interpolate_params(statement, params)?;
                let rows = sqlx::raw_sql(&sql).fetch_all(pool).await?;
                rows.iter().map(rows::mysql_row_to_json).collect()
            }
            Pool::MsSql(pool) => {
                let query = bind::mssql_query(statement, params)?;
                let mut conn = pool.get().await.map_err(mssql::acquire_error)?;
                let results = query.query(&mut *conn).await?.into_results().await?;
                results.into_iter().flatten().map(rows::mssql_row_to_json).collect()
            }
            Pool::Sqlite(pool) => {
                let args = bind::sqlite_arguments(params)?;
                let rows = sqlx::query_with(statement, args).fetch_all(pool).await?;
                rows.iter().map(rows::sqlite_row_to_json).collect()
            }
        }
    }

    /// Run caller-supplied SQL verbatim, without parameters.
    ///
    /// The simple/text protocol is used, so the text may hold several
    /// statements; rows from every statement are returned in order.
    pub async fn execute_sql(&self, sql: &str) -> Result<Vec<JsonRow>> {
        tracing::debug!(source = %self.name, sql, "Executing SQL");

        match &self.pool {
            Pool::Postgres(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                rows.iter().map(rows::pg_row_to_json).collect()
            }
            Pool::MySql { pool, query_timeout } => {
                let rows = with_timeout(*query_timeout, sqlx::raw_sql(sql).fetch_all(pool)).await?;
                rows.iter().map(rows::mysql_row_to_json).collect()
            }
            Pool::MindsDb(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                rows.iter().map(rows::mysql_row_to_json).collect()
            }
            Pool::MsSql(pool) => {
                let mut conn = pool.get().await.map_err(mssql::acquire_error)?;
                let results = conn.simple_query(sql).await?.into_results().await?;
                results.into_iter().flatten().map(rows::mssql_row_to_json).collect()
            }
            Pool::Sqlite(pool) => {
                let rows = sqlx::raw_sql(sql).fetch_all(pool).await?;
                rows.iter().map(rows::sqlite_row_to_json).collect()
            }
        }
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        match &self.pool {
            Pool::Postgres(pool) => pool.close().await,
            Pool::MySql { pool, .. } | Pool::MindsDb(pool) => pool.close().await,
            Pool::MsSql(pool) => pool.close(),
            Pool::Sqlite(pool) => pool.close().await,
        }
    }
}

async fn connect_postgres(config: &PostgresConfig, port: u16) -> std::result::Result<PgPool, sqlx::Error> {
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(port)
        .database(&config.database)
        .username(&config.user)
        .ssl_mode(pg_ssl_mode(config.ssl_mode));
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    let settings = pool_settings(config.pool.as_ref());
    PgPoolOptions::new()
        .min_connections(settings.min_connections)
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_seconds))
        .connect_with(options)
        .await
}

async fn connect_sqlite(config: &SqliteConfig) -> std::result::Result<SqlitePool, sqlx::Error> {
    if config.is_memory() {
        // Every pooled connection shares the same in-memory database, which
        // lives as long as one connection stays open.
        let options = SqliteConnectOptions::from_str(":memory:")?;
        return SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await;
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.database)
        .create_if_missing(true);
    SqlitePoolOptions::new().connect_with(options).await
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = std::result::Result<T, sqlx::Error>>,
) -> Result<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SourceError::Timeout(limit))?
            .map_err(SourceError::from),
        None => fut.await.map_err(SourceError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtoolbox_core::{ParamType, ParamValue};
    use serde_json::{Value, json};

    async fn memory_source() -> Source {
        let config = SourceConfig::Sqlite(SqliteConfig {
            database: ":memory:".to_string(),
        });
        Source::connect("local", &config).await.unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let source = memory_source().await;
        assert_eq!(source.kind(), SourceKind::Sqlite);

        source
            .execute_sql(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL, active BOOLEAN, avatar BLOB);
                 INSERT INTO users VALUES (1, 'Alice', 9.5, 1, x'00ff'), (2, 'Bob', NULL, 0, NULL);",
            )
            .await
            .unwrap();

        let params = ParamValues::new(vec![ParamValue {
            name: "id".into(),
            param_type: ParamType::Integer,
            items_type: None,
            value: json!(1),
        }]);
        let rows = source
            .query("SELECT id, name, score, active, avatar FROM users WHERE id = ?", &params)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.keys().cloned().collect::<Vec<_>>(), vec!["id", "name", "score", "active", "avatar"]);
        assert_eq!(row["id"], json!(1));
        assert_eq!(row["name"], json!("Alice"));
        assert_eq!(row["score"], json!(9.5));
        assert_eq!(row["active"], json!(true));
        assert_eq!(row["avatar"], json!("AP8="));
    }

    #[tokio::test]
    async fn test_sqlite_null_parameter_and_column() {
        let source = memory_source().await;
        source
            .execute_sql("CREATE TABLE t (v TEXT); INSERT INTO t VALUES (NULL);")
            .await
            .unwrap();

        let params = ParamValues::new(vec![ParamValue {
            name: "v".into(),
            param_type: ParamType::String,
            items_type: None,
            value: Value::Null,
        }]);
        let rows = source
            .query("SELECT v, ? IS NULL AS arg_is_null FROM t", &params)
            .await
            .unwrap();
        assert_eq!(rows[0]["v"], Value::Null);
        let flag = &rows[0]["arg_is_null"];
        assert!(*flag == json!(1) || *flag == json!(true), "unexpected {}", flag);
    }

    #[tokio::test]
    async fn test_driver_error_prefix() {
        let source = memory_source().await;
        let err = source.execute_sql("SELECT * FROM missing_table").await.unwrap_err();
        assert!(err.to_string().starts_with("unable to execute query:"));
    }

    #[tokio::test]
    async fn test_invalid_query_timeout_is_config_error() {
        let config = SourceConfig::MySql(MySqlConfig {
            host: "127.0.0.1".to_string(),
            port: Some(1),
            database: "app".to_string(),
            user: "root".to_string(),
            password: None,
            query_timeout: Some("soon".to_string()),
            ssl: false,
            pool: None,
        });
        let err = Source::connect("my-mysql", &config).await.unwrap_err();
        assert!(matches!(err, SourceError::Config { .. }), "unexpected {err:?}");
        assert!(err.to_string().contains("invalid queryTimeout \"soon\""));
    }

    #[tokio::test]
    async fn test_with_timeout() {
        let err = with_timeout(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, sqlx::Error>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, SourceError::Timeout(_)));
    }
}
