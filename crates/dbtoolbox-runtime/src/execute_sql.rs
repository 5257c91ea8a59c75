//! Tools that run caller-supplied SQL.

use std::sync::Arc;

use async_trait::async_trait;
use dbtoolbox_core::config::ExecuteSqlToolConfig;
use dbtoolbox_core::parameters::parse_params;
use dbtoolbox_core::{
    ClaimsMap, ConfigError, Manifest, McpManifest, ParamError, ParamType, ParamValues, Parameter,
    ToolKind,
};
use dbtoolbox_sources::Source;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::tool::{Tool, is_authorized, rows_to_result};

const SQL_PARAM: &str = "sql";

/// `<db>-execute-sql` tools. They take a single `sql` argument and run it verbatim.
pub struct ExecuteSqlTool {
    name: String,
    kind: ToolKind,
    source: Arc<Source>,
    parameters: Vec<Parameter>,
    auth_required: Vec<String>,
    manifest: Manifest,
    mcp_manifest: McpManifest,
}

impl ExecuteSqlTool {
    pub fn new(
        name: &str,
        kind: ToolKind,
        config: &ExecuteSqlToolConfig,
        source: Arc<Source>,
    ) -> Result<Self, ConfigError> {
        if !kind.compatible_sources().contains(&source.kind()) {
            return Err(ConfigError::IncompatibleSource {
                tool: name.to_string(),
                kind,
                expected: kind.compatible_sources().iter().map(|k| k.as_str()).collect(),
            });
        }

        let parameters = vec![Parameter::new(SQL_PARAM, ParamType::String, "The sql to execute.")];

        Ok(Self {
            name: name.to_string(),
            kind,
            source,
            manifest: Manifest::new(&config.description, &parameters, &config.auth_required),
            mcp_manifest: McpManifest::new(name, &config.description, &parameters),
            parameters,
            auth_required: config.auth_required.clone(),
        })
    }
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn parse_params(&self, data: &Map<String, Value>, claims: &ClaimsMap) -> Result<ParamValues, ToolError> {
        Ok(parse_params(&self.parameters, data, claims)?)
    }

    async fn invoke(&self, params: ParamValues) -> Result<Value, ToolError> {
        let sql = params
            .get(SQL_PARAM)
            .and_then(|p| p.value.as_str())
            .ok_or_else(|| ParamError::InvalidType {
                name: SQL_PARAM.to_string(),
                expected: ParamType::String,
            })?;

        tracing::debug!(tool = %self.name, kind = %self.kind, "Executing caller SQL");
        let rows = self.source.execute_sql(sql).await?;
        Ok(rows_to_result(rows))
    }

    fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn mcp_manifest(&self) -> &McpManifest {
        &self.mcp_manifest
    }

    fn authorized(&self, verified_services: &[String]) -> bool {
        is_authorized(&self.auth_required, verified_services)
    }
}
