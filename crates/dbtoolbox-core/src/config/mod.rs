//! Tools file configuration.
//!
//! A tools file is a YAML document with four optional top-level maps:
//!
//! - **sources**: named database connections, see [`SourceConfig`]
//! - **authServices**: named token verifiers, see [`AuthServiceConfig`]
//! - **tools**: named statements bound to a source, see [`ToolConfig`]
//! - **toolsets**: named lists of tool names
//!
//! `${VAR}` references anywhere in the file are replaced with the value of the
//! environment variable before parsing. Several files can be merged into one
//! [`ToolsFile`] as long as no name is defined twice.

pub mod auth;
pub mod source;
pub mod tool;

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub use auth::{AuthServiceConfig, JwtAuthConfig};
pub use source::{
    ConnectionPoolConfig, MsSqlConfig, MySqlConfig, PostgresConfig, SourceConfig, SourceKind,
    SqliteConfig, SslMode,
};
pub use tool::{ExecuteSqlToolConfig, SqlToolConfig, ToolConfig, ToolKind};

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Static regex is valid"));

static RESOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Static regex is valid"));

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read tools file {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("unable to parse tools file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("environment variable \"{0}\" is not set")]
    MissingEnv(String),

    #[error("resource name collision: {category} \"{name}\" is defined more than once")]
    Collision { category: &'static str, name: String },

    #[error("invalid {category} name \"{name}\": only letters, digits, '_' and '-' are allowed")]
    InvalidName { category: &'static str, name: String },

    #[error("invalid source \"{name}\": {message}")]
    InvalidSource { name: String, message: String },

    #[error("invalid auth service \"{name}\": {message}")]
    InvalidAuthService { name: String, message: String },

    #[error("unable to initialize tool \"{tool}\": no source named \"{source_name}\" configured")]
    UnknownSource { tool: String, source_name: String },

    #[error("invalid source for \"{kind}\" tool: source kind must be one of {expected:?}")]
    IncompatibleSource {
        tool: String,
        kind: ToolKind,
        expected: Vec<&'static str>,
    },

    #[error("duplicate parameter name \"{name}\"")]
    DuplicateParameter { name: String },

    #[error("invalid parameters for tool \"{tool}\": {message}")]
    InvalidParameter { tool: String, message: String },

    #[error("{referrer} references unknown auth service \"{service}\"")]
    UnknownAuthService { referrer: String, service: String },

    #[error("toolset \"{toolset}\" references unknown tool \"{tool}\"")]
    UnknownTool { toolset: String, tool: String },
}

/// The parsed contents of one or more tools files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolsFile {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,

    #[serde(default, alias = "authSources")]
    pub auth_services: BTreeMap<String, AuthServiceConfig>,

    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,

    #[serde(default)]
    pub toolsets: BTreeMap<String, Vec<String>>,
}

/// Remove and return the `kind` discriminator of a resource entry.
pub(crate) fn take_kind(value: &mut serde_yaml::Value) -> Result<String, String> {
    let mapping = value
        .as_mapping_mut()
        .ok_or_else(|| "expected a mapping".to_string())?;

    match mapping.remove("kind") {
        Some(serde_yaml::Value::String(kind)) => Ok(kind),
        Some(other) => Err(format!("field `kind` must be a string, got {:?}", other)),
        None => Err("missing field `kind`".to_string()),
    }
}

/// Replace every `${VAR}` with the value of the environment variable `VAR`.
pub fn expand_env(content: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let expanded = ENV_REF.replace_all(content, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnv(name)),
        None => Ok(expanded.into_owned()),
    }
}

impl ToolsFile {
    /// Parse a single tools file from YAML content. Does not validate.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env(content)?;
        if expanded.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&expanded).map_err(ConfigError::from)
    }

    /// Read and parse a single tools file. Does not validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_yaml(&content)
    }

    /// Read, merge and validate one or more tools files.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut merged = Self::default();
        for path in paths {
            let file = Self::from_file(path)?;
            tracing::debug!(path = %path.as_ref().display(), tools = file.tools.len(), "Loaded tools file");
            merged.merge(file)?;
        }
        merged.validate()?;
        Ok(merged)
    }

    /// Fold `other` into `self`. A name already present in the same category is an error.
    pub fn merge(&mut self, other: ToolsFile) -> Result<(), ConfigError> {
        merge_category(&mut self.sources, other.sources, "source")?;
        merge_category(&mut self.auth_services, other.auth_services, "auth service")?;
        merge_category(&mut self.tools, other.tools, "tool")?;
        merge_category(&mut self.toolsets, other.toolsets, "toolset")?;
        Ok(())
    }

    /// Check names and cross references. Everything reported here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_names(self.sources.keys(), "source")?;
        check_names(self.auth_services.keys(), "auth service")?;
        check_names(self.tools.keys(), "tool")?;
        check_names(self.toolsets.keys(), "toolset")?;

        for (name, source) in &self.sources {
            source.validate(name)?;
        }

        for (name, service) in &self.auth_services {
            service.validate().map_err(|message| ConfigError::InvalidAuthService {
                name: name.clone(),
                message,
            })?;
        }

        for (name, tool) in &self.tools {
            self.validate_tool(name, tool)?;
        }

        for (toolset, tools) in &self.toolsets {
            if let Some(missing) = tools.iter().find(|t| !self.tools.contains_key(*t)) {
                return Err(ConfigError::UnknownTool {
                    toolset: toolset.clone(),
                    tool: missing.clone(),
                });
            }
        }

        Ok(())
    }

    fn validate_tool(&self, name: &str, tool: &ToolConfig) -> Result<(), ConfigError> {
        let kind = tool.kind();
        let source = self
            .sources
            .get(tool.source())
            .ok_or_else(|| ConfigError::UnknownSource {
                tool: name.to_string(),
                source_name: tool.source().to_string(),
            })?;

        if !kind.compatible_sources().contains(&source.kind()) {
            return Err(ConfigError::IncompatibleSource {
                tool: name.to_string(),
                kind,
                expected: kind.compatible_sources().iter().map(|k| k.as_str()).collect(),
            });
        }

        let params = tool.all_parameters().map_err(|e| ConfigError::InvalidParameter {
            tool: name.to_string(),
            message: e.to_string(),
        })?;

        for param in &params {
            param.validate().map_err(|message| ConfigError::InvalidParameter {
                tool: name.to_string(),
                message,
            })?;

            for service in &param.auth_services {
                if !self.auth_services.contains_key(&service.name) {
                    return Err(ConfigError::UnknownAuthService {
                        referrer: format!("parameter \"{}\" of tool \"{}\"", param.name, name),
                        service: service.name.clone(),
                    });
                }
            }
        }

        for service in tool.auth_required() {
            if !self.auth_services.contains_key(service) {
                return Err(ConfigError::UnknownAuthService {
                    referrer: format!("tool \"{}\"", name),
                    service: service.clone(),
                });
            }
        }

        Ok(())
    }
}

fn merge_category<V>(
    into: &mut BTreeMap<String, V>,
    from: BTreeMap<String, V>,
    category: &'static str,
) -> Result<(), ConfigError> {
    for (name, value) in from {
        if into.contains_key(&name) {
            return Err(ConfigError::Collision { category, name });
        }
        into.insert(name, value);
    }
    Ok(())
}

fn check_names<'a>(
    names: impl Iterator<Item = &'a String>,
    category: &'static str,
) -> Result<(), ConfigError> {
    for name in names {
        if !RESOURCE_NAME.is_match(name) {
            return Err(ConfigError::InvalidName {
                category,
                name: name.clone(),
            });
        }
    }
    Ok(())
}
