//! REST and MCP descriptions of a tool.

use crate::parameters::{ParamType, Parameter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// One parameter as shown by `GET /api/tool/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
    pub auth_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterManifest>>,
}

impl From<&Parameter> for ParameterManifest {
    fn from(param: &Parameter) -> Self {
        Self {
            name: param.name.clone(),
            param_type: param.param_type,
            required: param.is_required(),
            description: param.description.clone(),
            auth_sources: param.auth_services.iter().map(|s| s.name.clone()).collect(),
            items: param.items.as_deref().map(|i| Box::new(ParameterManifest::from(i))),
        }
    }
}

/// REST manifest of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub description: String,
    pub parameters: Vec<ParameterManifest>,
    pub auth_required: Vec<String>,
}

impl Manifest {
    pub fn new(description: &str, parameters: &[Parameter], auth_required: &[String]) -> Self {
        Self {
            description: description.to_string(),
            parameters: parameters.iter().map(ParameterManifest::from).collect(),
            auth_required: auth_required.to_vec(),
        }
    }
}

/// MCP `tools/list` entry of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpManifest {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl McpManifest {
    /// Build the manifest. Auth-sourced parameters are left out of the schema.
    pub fn new(name: &str, description: &str, parameters: &[Parameter]) -> Self {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in parameters.iter().filter(|p| !p.is_auth_sourced()) {
            properties.insert(param.name.clone(), property_schema(param));
            if param.is_required() {
                required.push(Value::String(param.name.clone()));
            }
        }

        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

fn property_schema(param: &Parameter) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!(param.param_type.json_schema_type()));
    if !param.description.is_empty() {
        schema.insert("description".into(), json!(param.description));
    }
    if let Some(items) = &param.items {
        schema.insert("items".into(), property_schema(items));
    }
    if param.param_type == ParamType::Map {
        let additional = match param.value_type {
            Some(vt) => json!({ "type": vt.json_schema_type() }),
            None => json!(true),
        };
        schema.insert("additionalProperties".into(), additional);
    }
    if let Some(default) = &param.default {
        schema.insert("default".into(), default.clone());
    }
    Value::Object(schema)
}
