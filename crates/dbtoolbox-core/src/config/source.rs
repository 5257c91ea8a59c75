//! Source (database connection) configuration.
//!
//! Every entry under `sources:` carries a `kind`. The remaining fields depend
//! on the kind:
//!
//! ```yaml
//! sources:
//!   my-pg:
//!     kind: postgres
//!     host: 127.0.0.1
//!     port: 5432
//!     database: app
//!     user: ${DB_USER}
//!     password: ${DB_PASSWORD}
//!   local:
//!     kind: sqlite
//!     database: ./app.db
//! ```

use super::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Database engine behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    Tidb,
    #[serde(rename = "mindsdb")]
    MindsDb,
    #[serde(rename = "mssql")]
    MsSql,
    Sqlite,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Postgres,
        SourceKind::MySql,
        SourceKind::Tidb,
        SourceKind::MindsDb,
        SourceKind::MsSql,
        SourceKind::Sqlite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Tidb => "tidb",
            Self::MindsDb => "mindsdb",
            Self::MsSql => "mssql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Port used when the source does not set one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::MySql => Some(3306),
            Self::Tidb => Some(4000),
            Self::MindsDb => Some(47335),
            Self::MsSql => Some(1433),
            Self::Sqlite => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown source kind \"{}\"", s))
    }
}

/// SSL mode for Postgres connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    #[serde(rename = "verify-ca")]
    VerifyCa,
    #[serde(rename = "verify-full")]
    VerifyFull,
}

/// Connection pool settings shared by all network sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectionPoolConfig {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait for a free connection before failing the query.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
        }
    }
}

fn default_min_connections() -> u32 {
    0
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_host() -> String {
    "localhost".to_string()
}

/// Ports show up both as `5432` and as `"5432"` (typically after `${VAR}`
/// expansion), so accept either.
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Int(u16),
        Str(String),
    }

    match Option::<PortRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PortRepr::Int(port)) => Ok(Some(port)),
        Some(PortRepr::Str(s)) => s
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port \"{}\"", s))),
    }
}

/// `kind: postgres`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostgresConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default, deserialize_with = "deserialize_port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    pub database: String,

    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub ssl_mode: SslMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<ConnectionPoolConfig>,
}

/// `kind: mysql`, `kind: tidb` and `kind: mindsdb`.
///
/// All three speak the MySQL wire protocol. `ssl` is only meaningful for
/// TiDB Cloud, `queryTimeout` is a duration such as `30s` or `2m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MySqlConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default, deserialize_with = "deserialize_port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    pub database: String,

    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout: Option<String>,

    #[serde(default)]
    pub ssl: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<ConnectionPoolConfig>,
}

impl MySqlConfig {
    /// Parsed `queryTimeout`.
    pub fn query_timeout(&self) -> Result<Option<Duration>, String> {
        self.query_timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw)
                    .map_err(|e| format!("invalid queryTimeout \"{}\": {}", raw, e))
            })
            .transpose()
    }
}

/// `kind: mssql`
///
/// `encrypt` turns on TLS for the whole session. `trustServerCertificate`
/// skips certificate validation, which self-signed development servers need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MsSqlConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default, deserialize_with = "deserialize_port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    pub database: String,

    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default)]
    pub encrypt: bool,

    #[serde(default)]
    pub trust_server_certificate: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<ConnectionPoolConfig>,
}

/// `kind: sqlite`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SqliteConfig {
    /// File path, or `:memory:` for a private in-memory database.
    pub database: String,
}

impl SqliteConfig {
    pub fn is_memory(&self) -> bool {
        self.database == ":memory:"
    }
}

/// A configured source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Postgres(PostgresConfig),
    MySql(MySqlConfig),
    Tidb(MySqlConfig),
    MindsDb(MySqlConfig),
    MsSql(MsSqlConfig),
    Sqlite(SqliteConfig),
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Postgres(_) => SourceKind::Postgres,
            Self::MySql(_) => SourceKind::MySql,
            Self::Tidb(_) => SourceKind::Tidb,
            Self::MindsDb(_) => SourceKind::MindsDb,
            Self::MsSql(_) => SourceKind::MsSql,
            Self::Sqlite(_) => SourceKind::Sqlite,
        }
    }

    /// Port to connect to, falling back to the engine default.
    pub fn port(&self) -> Option<u16> {
        let configured = match self {
            Self::Postgres(c) => c.port,
            Self::MySql(c) | Self::Tidb(c) | Self::MindsDb(c) => c.port,
            Self::MsSql(c) => c.port,
            Self::Sqlite(_) => None,
        };
        configured.or(self.kind().default_port())
    }

    /// Checks that need more than the shape of the YAML.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidSource {
            name: name.to_string(),
            message,
        };

        match self {
            Self::Postgres(c) => check_pool(c.pool.as_ref()).map_err(invalid),
            Self::MySql(c) | Self::Tidb(c) | Self::MindsDb(c) => {
                c.query_timeout().map_err(invalid)?;
                check_pool(c.pool.as_ref()).map_err(invalid)
            }
            Self::MsSql(c) => check_pool(c.pool.as_ref()).map_err(invalid),
            Self::Sqlite(c) if c.database.trim().is_empty() => {
                Err(invalid("\"database\" must not be empty".to_string()))
            }
            Self::Sqlite(_) => Ok(()),
        }
    }

    pub(crate) fn from_yaml_value(mut value: serde_yaml::Value) -> Result<Self, String> {
        let kind = super::take_kind(&mut value)?;
        let kind = SourceKind::from_str(&kind)?;

        let decoded = match kind {
            SourceKind::Postgres => serde_yaml::from_value(value).map(Self::Postgres),
            SourceKind::MySql => serde_yaml::from_value(value).map(Self::MySql),
            SourceKind::Tidb => serde_yaml::from_value(value).map(Self::Tidb),
            SourceKind::MindsDb => serde_yaml::from_value(value).map(Self::MindsDb),
            SourceKind::MsSql => serde_yaml::from_value(value).map(Self::MsSql),
            SourceKind::Sqlite => serde_yaml::from_value(value).map(Self::Sqlite),
        };
        decoded.map_err(|e| format!("{} source: {}", kind, e))
    }
}

impl<'de> Deserialize<'de> for SourceConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        Self::from_yaml_value(value).map_err(serde::de::Error::custom)
    }
}

fn check_pool(pool: Option<&ConnectionPoolConfig>) -> Result<(), String> {
    match pool {
        Some(p) if p.max_connections == 0 => Err("pool.maxConnections must be at least 1".to_string()),
        Some(p) if p.min_connections > p.max_connections => Err(format!(
            "pool.minConnections ({}) exceeds pool.maxConnections ({})",
            p.min_connections, p.max_connections
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_source() {
        let yaml = r#"
kind: postgres
host: db.internal
port: "6543"
database: app
user: reader
password: secret
sslMode: verify-full
"#;
        let config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        let SourceConfig::Postgres(pg) = &config else {
            panic!("expected postgres, got {:?}", config);
        };
        assert_eq!(pg.host, "db.internal");
        assert_eq!(pg.ssl_mode, SslMode::VerifyFull);
        assert_eq!(config.port(), Some(6543));
    }

    #[test]
    fn test_default_ports() {
        let yaml = "kind: mindsdb\ndatabase: mindsdb\nuser: mindsdb\n";
        let config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.kind(), SourceKind::MindsDb);
        assert_eq!(config.port(), Some(47335));

        let yaml = "kind: tidb\ndatabase: test\nuser: root\nssl: true\n";
        let config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port(), Some(4000));
    }

    #[test]
    fn test_mssql_source() {
        let yaml = r#"
kind: mssql
host: sql.internal
database: sales
user: sa
password: secret
trustServerCertificate: true
"#;
        let config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate("my-mssql").unwrap();
        assert_eq!(config.kind(), SourceKind::MsSql);
        assert_eq!(config.port(), Some(1433));
        let SourceConfig::MsSql(mssql) = &config else {
            panic!("expected mssql, got {:?}", config);
        };
        assert!(mssql.trust_server_certificate);
        assert!(!mssql.encrypt);
    }

    #[test]
    fn test_unknown_kind() {
        let err = serde_yaml::from_str::<SourceConfig>("kind: oracle\ndatabase: x\n").unwrap_err();
        assert!(err.to_string().contains("unknown source kind \"oracle\""));
    }

    #[test]
    fn test_missing_kind_and_fields() {
        let err = serde_yaml::from_str::<SourceConfig>("database: x\n").unwrap_err();
        assert!(err.to_string().contains("kind"));

        let err = serde_yaml::from_str::<SourceConfig>("kind: postgres\nhost: x\n").unwrap_err();
        assert!(err.to_string().contains("database"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = serde_yaml::from_str::<SourceConfig>("kind: sqlite\ndatabase: x\nhots: y\n").unwrap_err();
        assert!(err.to_string().contains("hots"));
    }

    #[test]
    fn test_query_timeout_validation() {
        let yaml = "kind: mysql\ndatabase: app\nuser: root\nqueryTimeout: 30s\n";
        let config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate("my-mysql").unwrap();
        let SourceConfig::MySql(mysql) = &config else { unreachable!() };
        assert_eq!(mysql.query_timeout().unwrap(), Some(Duration::from_secs(30)));

        let yaml = "kind: mysql\ndatabase: app\nuser: root\nqueryTimeout: soon\n";
        let config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate("my-mysql").unwrap_err();
        assert!(err.to_string().contains("queryTimeout"));
    }

    #[test]
    fn test_pool_validation() {
        let yaml = r#"
kind: postgres
database: app
user: app
pool:
  minConnections: 5
  maxConnections: 2
"#;
        let config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate("pg").is_err());
    }
}
