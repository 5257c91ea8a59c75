//! Tools that run a fixed, parameterized statement.

use std::sync::Arc;

use async_trait::async_trait;
use dbtoolbox_core::config::SqlToolConfig;
use dbtoolbox_core::parameters::{ordered_params, parse_params};
use dbtoolbox_core::{
    ClaimsMap, ConfigError, Manifest, McpManifest, ParamValues, Parameter, ToolKind,
    resolve_template_params,
};
use dbtoolbox_sources::Source;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::tool::{Tool, is_authorized, rows_to_result};

/// `<db>-sql` tools.
///
/// Invocation resolves template parameters into the statement text first,
/// then binds the ordinary parameters positionally in declaration order.
pub struct SqlTool {
    name: String,
    kind: ToolKind,
    source: Arc<Source>,
    statement: String,
    parameters: Vec<Parameter>,
    template_parameters: Vec<Parameter>,
    all_parameters: Vec<Parameter>,
    auth_required: Vec<String>,
    manifest: Manifest,
    mcp_manifest: McpManifest,
}

impl SqlTool {
    pub fn new(
        name: &str,
        kind: ToolKind,
        config: &SqlToolConfig,
        source: Arc<Source>,
    ) -> Result<Self, ConfigError> {
        if !kind.compatible_sources().contains(&source.kind()) {
            return Err(ConfigError::IncompatibleSource {
                tool: name.to_string(),
                kind,
                expected: kind.compatible_sources().iter().map(|k| k.as_str()).collect(),
            });
        }

        let all_parameters = dbtoolbox_core::parameters::combine_parameters(
            &config.parameters,
            &config.template_parameters,
        )?;

        Ok(Self {
            name: name.to_string(),
            kind,
            source,
            statement: config.statement.clone(),
            parameters: config.parameters.clone(),
            template_parameters: config.template_parameters.clone(),
            manifest: Manifest::new(&config.description, &all_parameters, &config.auth_required),
            mcp_manifest: McpManifest::new(name, &config.description, &all_parameters),
            all_parameters,
            auth_required: config.auth_required.clone(),
        })
    }
}

#[async_trait]
impl Tool for SqlTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ToolKind {
        self.kind
    }

    fn parse_params(&self, data: &Map<String, Value>, claims: &ClaimsMap) -> Result<ParamValues, ToolError> {
        Ok(parse_params(&self.all_parameters, data, claims)?)
    }

    async fn invoke(&self, params: ParamValues) -> Result<Value, ToolError> {
        let statement = resolve_template_params(&self.template_parameters, &self.statement, &params)?;
        let positional = ordered_params(&self.parameters, &params)?;

        tracing::debug!(tool = %self.name, kind = %self.kind, "Invoking statement");
        let rows = self.source.query(&statement, &positional).await?;
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
