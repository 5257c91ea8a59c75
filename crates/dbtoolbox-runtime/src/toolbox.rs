//! The resource manager: every source, auth service, tool and toolset built
//! from a validated tools file.

use std::collections::BTreeMap;
use std::sync::Arc;

use dbtoolbox_auth::{AuthService, AuthServices, build_auth_service, verified_claims};
use dbtoolbox_core::{ClaimsMap, Manifest, ToolConfig, ToolsFile};
use dbtoolbox_sources::Source;
use serde_json::{Map, Value};

use crate::error::{ToolError, ToolboxError};
use crate::execute_sql::ExecuteSqlTool;
use crate::sql::SqlTool;
use crate::tool::Tool;

/// A named subset of tools.
#[derive(Clone)]
pub struct Toolset {
    name: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl Toolset {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// REST manifests keyed by tool name.
    pub fn manifests(&self) -> BTreeMap<String, Manifest> {
        self.tools
            .iter()
            .map(|t| (t.name().to_string(), t.manifest().clone()))
            .collect()
    }
}

/// Everything the server needs to answer requests. Immutable once built.
pub struct Toolbox {
    sources: BTreeMap<String, Arc<Source>>,
    auth_services: AuthServices,
    tools: BTreeMap<String, Arc<dyn Tool>>,
    toolsets: BTreeMap<String, Toolset>,
}

impl Toolbox {
    /// Name of the toolset that holds every tool.
    pub const DEFAULT_TOOLSET: &'static str = "";

    /// Connect every source and build every auth service, tool and toolset.
    pub async fn build(file: &ToolsFile) -> Result<Self, ToolboxError> {
        file.validate()?;

        let mut sources = BTreeMap::new();
        for (name, config) in &file.sources {
            let source = Source::connect(name, config).await?;
            sources.insert(name.clone(), Arc::new(source));
        }
        tracing::info!(count = sources.len(), "Initialized sources");

        let mut auth_services: AuthServices = BTreeMap::new();
        for (name, config) in &file.auth_services {
            auth_services.insert(name.clone(), build_auth_service(name, config)?);
        }
        tracing::info!(count = auth_services.len(), "Initialized auth services");

        let mut tools: BTreeMap<String, Arc<dyn Tool>> = BTreeMap::new();
        for (name, config) in &file.tools {
            let source = sources.get(config.source()).cloned().ok_or_else(|| {
                dbtoolbox_core::ConfigError::UnknownSource {
                    tool: name.clone(),
                    source_name: config.source().to_string(),
                }
            })?;

            let tool: Arc<dyn Tool> = match config {
                ToolConfig::Sql { kind, config } => Arc::new(SqlTool::new(name, *kind, config, source)?),
                ToolConfig::ExecuteSql { kind, config } => {
                    Arc::new(ExecuteSqlTool::new(name, *kind, config, source)?)
                }
            };
            tracing::debug!(tool = %name, kind = %tool.kind(), "Initialized tool");
            tools.insert(name.clone(), tool);
        }
        tracing::info!(count = tools.len(), "Initialized tools");

        let mut toolsets = BTreeMap::new();
        toolsets.insert(
            Self::DEFAULT_TOOLSET.to_string(),
            Toolset {
                name: Self::DEFAULT_TOOLSET.to_string(),
                tools: tools.values().cloned().collect(),
            },
        );
        for (name, tool_names) in &file.toolsets {
            let members = tool_names
                .iter()
                .filter_map(|t| tools.get(t).cloned())
                .collect();
            toolsets.insert(
                name.clone(),
                Toolset {
                    name: name.clone(),
                    tools: members,
                },
            );
        }
        tracing::info!(count = toolsets.len(), "Initialized toolsets");

        Ok(Self {
            sources,
            auth_services,
            tools,
            toolsets,
        })
    }

    pub fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    /// Look up a toolset. The empty name is the default toolset.
    pub fn toolset(&self, name: &str) -> Option<&Toolset> {
        self.toolsets.get(name)
    }

    pub fn auth_service(&self, name: &str) -> Option<&Arc<dyn AuthService>> {
        self.auth_services.get(name)
    }

    /// Verify every auth service token a request carries.
    pub async fn claims_from_headers<F>(&self, header: F) -> ClaimsMap
    where
        F: Fn(&str) -> Option<String>,
    {
        verified_claims(self.auth_services.values(), header).await
    }

    /// Find, authorize, parse and run a tool.
    pub async fn invoke(
        &self,
        name: &str,
        data: &Map<String, Value>,
        claims: &ClaimsMap,
    ) -> Result<Value, ToolError> {
        let tool = self.tool(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let verified: Vec<String> = claims.keys().cloned().collect();
        if !tool.authorized(&verified) {
            tracing::warn!(tool = %name, "Tool invocation not authorized");
            return Err(ToolError::Unauthorized);
        }

        let params = tool.parse_params(data, claims)?;
        tracing::debug!(tool = %name, params = params.len(), "Invoking tool");

        match tool.invoke(params).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(tool = %name, error = %e, "Tool invocation failed");
                Err(e)
            }
        }
    }

    /// Close every source pool.
    pub async fn close(&self) {
        for source in self.sources.values() {
            source.close().await;
        }
    }
}
