//! Tool configuration.

use super::source::SourceKind;
use crate::parameters::{Parameter, combine_parameters};
use super::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every tool kind this server knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "postgres-sql")]
    PostgresSql,
    #[serde(rename = "postgres-execute-sql")]
    PostgresExecuteSql,
    #[serde(rename = "mysql-sql")]
    MySqlSql,
    #[serde(rename = "mysql-execute-sql")]
    MySqlExecuteSql,
    #[serde(rename = "tidb-sql")]
    TidbSql,
    #[serde(rename = "tidb-execute-sql")]
    TidbExecuteSql,
    #[serde(rename = "mindsdb-sql")]
    MindsDbSql,
    #[serde(rename = "mindsdb-execute-sql")]
    MindsDbExecuteSql,
    #[serde(rename = "mssql-sql")]
    MsSqlSql,
    #[serde(rename = "mssql-execute-sql")]
    MsSqlExecuteSql,
    #[serde(rename = "sqlite-sql")]
    SqliteSql,
    #[serde(rename = "sqlite-execute-sql")]
    SqliteExecuteSql,
}

impl ToolKind {
    pub const ALL: [ToolKind; 12] = [
        ToolKind::PostgresSql,
        ToolKind::PostgresExecuteSql,
        ToolKind::MySqlSql,
        ToolKind::MySqlExecuteSql,
        ToolKind::TidbSql,
        ToolKind::TidbExecuteSql,
        ToolKind::MindsDbSql,
        ToolKind::MindsDbExecuteSql,
        ToolKind::MsSqlSql,
        ToolKind::MsSqlExecuteSql,
        ToolKind::SqliteSql,
        ToolKind::SqliteExecuteSql,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostgresSql => "postgres-sql",
            Self::PostgresExecuteSql => "postgres-execute-sql",
            Self::MySqlSql => "mysql-sql",
            Self::MySqlExecuteSql => "mysql-execute-sql",
            Self::TidbSql => "tidb-sql",
            Self::TidbExecuteSql => "tidb-execute-sql",
            Self::MindsDbSql => "mindsdb-sql",
            Self::MindsDbExecuteSql => "mindsdb-execute-sql",
            Self::MsSqlSql => "mssql-sql",
            Self::MsSqlExecuteSql => "mssql-execute-sql",
            Self::SqliteSql => "sqlite-sql",
            Self::SqliteExecuteSql => "sqlite-execute-sql",
        }
    }

    /// Source kinds a tool of this kind may be bound to.
    pub fn compatible_sources(&self) -> &'static [SourceKind] {
        match self {
            Self::PostgresSql | Self::PostgresExecuteSql => &[SourceKind::Postgres],
            Self::MySqlSql | Self::MySqlExecuteSql => &[SourceKind::MySql],
            Self::TidbSql | Self::TidbExecuteSql => &[SourceKind::Tidb],
            Self::MindsDbSql | Self::MindsDbExecuteSql => &[SourceKind::MindsDb],
            Self::MsSqlSql | Self::MsSqlExecuteSql => &[SourceKind::MsSql],
            Self::SqliteSql | Self::SqliteExecuteSql => &[SourceKind::Sqlite],
        }
    }

    /// Whether the tool runs caller-supplied SQL instead of a fixed statement.
    pub fn is_execute_sql(&self) -> bool {
        matches!(
            self,
            Self::PostgresExecuteSql
                | Self::MySqlExecuteSql
                | Self::TidbExecuteSql
                | Self::MindsDbExecuteSql
                | Self::MsSqlExecuteSql
                | Self::SqliteExecuteSql
        )
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown tool kind \"{}\"", s))
    }
}

/// A tool running a fixed, parameterized statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SqlToolConfig {
    pub source: String,

    pub description: String,

    pub statement: String,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Parameters substituted into the statement text before binding.
    #[serde(default)]
    pub template_parameters: Vec<Parameter>,

    #[serde(default)]
    pub auth_required: Vec<String>,
}

/// A tool that runs whatever SQL the caller sends in its `sql` argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecuteSqlToolConfig {
    pub source: String,

    pub description: String,

    #[serde(default)]
    pub auth_required: Vec<String>,
}

/// A configured tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolConfig {
    Sql { kind: ToolKind, config: SqlToolConfig },
    ExecuteSql { kind: ToolKind, config: ExecuteSqlToolConfig },
}

impl ToolConfig {
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Sql { kind, .. } | Self::ExecuteSql { kind, .. } => *kind,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Sql { config, .. } => &config.source,
            Self::ExecuteSql { config, .. } => &config.source,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Sql { config, .. } => &config.description,
            Self::ExecuteSql { config, .. } => &config.description,
        }
    }

    pub fn auth_required(&self) -> &[String] {
        match self {
            Self::Sql { config, .. } => &config.auth_required,
            Self::ExecuteSql { config, .. } => &config.auth_required,
        }
    }

    /// Parameters followed by template parameters.
    ///
    /// Execute-SQL tools declare no parameters here; their fixed `sql`
    /// argument is added by the tool itself.
    pub fn all_parameters(&self) -> Result<Vec<Parameter>, ConfigError> {
        match self {
            Self::Sql { config, .. } => combine_parameters(&config.parameters, &config.template_parameters),
            Self::ExecuteSql { .. } => Ok(Vec::new()),
        }
    }

    pub(crate) fn from_yaml_value(mut value: serde_yaml::Value) -> Result<Self, String> {
        let kind = super::take_kind(&mut value)?;
        let kind = ToolKind::from_str(&kind)?;

        let decoded = if kind.is_execute_sql() {
            serde_yaml::from_value(value).map(|config| Self::ExecuteSql { kind, config })
        } else {
            serde_yaml::from_value(value).map(|config| Self::Sql { kind, config })
        };
        decoded.map_err(|e| format!("{} tool: {}", kind, e))
    }
}

impl<'de> Deserialize<'de> for ToolConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        Self::from_yaml_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParamType;

    #[test]
    fn test_sql_tool() {
        let yaml = r#"
kind: postgres-sql
source: my-pg
description: Search hotels by name.
statement: SELECT * FROM {{.table}} WHERE name ILIKE '%' || $1 || '%'
parameters:
  - name: name
    type: string
    description: hotel name
templateParameters:
  - name: table
    type: string
    description: table to search
authRequired: [my-auth]
"#;
        let tool: ToolConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tool.kind(), ToolKind::PostgresSql);
        assert_eq!(tool.source(), "my-pg");
        assert_eq!(tool.auth_required(), ["my-auth".to_string()]);

        let all = tool.all_parameters().unwrap();
        let names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "table"]);
        assert_eq!(all[1].param_type, ParamType::String);
    }

    #[test]
    fn test_execute_sql_tool_rejects_statement() {
        let yaml = "kind: sqlite-execute-sql\nsource: db\ndescription: run sql\n";
        let tool: ToolConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(tool.kind().is_execute_sql());
        assert!(tool.all_parameters().unwrap().is_empty());

        let yaml = "kind: sqlite-execute-sql\nsource: db\ndescription: run sql\nstatement: SELECT 1\n";
        let err = serde_yaml::from_str::<ToolConfig>(yaml).unwrap_err();
        assert!(err.to_string().contains("statement"));
    }

    #[test]
    fn test_unknown_tool_kind() {
        let err = serde_yaml::from_str::<ToolConfig>("kind: bigquery-sql\nsource: bq\n").unwrap_err();
        assert!(err.to_string().contains("unknown tool kind \"bigquery-sql\""));
    }

    #[test]
    fn test_compatible_sources() {
        assert_eq!(ToolKind::TidbExecuteSql.compatible_sources(), &[SourceKind::Tidb]);
        assert_eq!("mindsdb-sql".parse::<ToolKind>().unwrap(), ToolKind::MindsDbSql);
        assert_eq!(ToolKind::MsSqlSql.compatible_sources(), &[SourceKind::MsSql]);
        assert!("mssql-execute-sql".parse::<ToolKind>().unwrap().is_execute_sql());
    }
}
