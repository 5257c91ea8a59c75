//! # dbtoolbox-core
//!
//! Shared model for the dbtoolbox tool server.
//!
//! A *tools file* declares database **sources**, **auth services**, **tools**
//! (a statement plus a parameter schema bound to one source) and **toolsets**.
//! This crate owns everything about those declarations that does not need a
//! live connection:
//!
//! - [`config`]: loading, merging and validating the YAML tools file
//! - [`parameters`]: declared parameters, request-time parsing and ordering
//! - [`template`]: `{{.name}}` substitution of template parameters
//! - [`manifest`]: the REST and MCP descriptions of a tool
//!
//! ## Request pipeline
//!
//! ```text
//! request body + verified claims
//!       │
//!       ▼
//! parse_params        ← type checks, defaults, auth-sourced values
//!       │
//!       ▼
//! resolve_template    ← identifiers substituted into the statement text
//!       │
//!       ▼
//! ordered_params      ← positional arguments in declaration order
//!       │
//!       ▼
//!   driver (dbtoolbox-sources)
//! ```

pub mod config;
pub mod manifest;
pub mod parameters;
pub mod template;

pub use config::{
    AuthServiceConfig, ConfigError, JwtAuthConfig, SourceConfig, SourceKind, ToolConfig,
    ToolKind, ToolsFile,
};
pub use manifest::{Manifest, McpManifest, ParameterManifest};
pub use parameters::{
    ClaimsMap, ParamAuthService, ParamError, ParamType, ParamValue, ParamValues, Parameter,
};
pub use template::{TemplateError, resolve_template_params};
