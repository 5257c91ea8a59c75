//! Declared tool parameters and their request-time resolution.
//!
//! A tool declares an ordered list of [`Parameter`]s. At request time the
//! caller supplies a JSON object of arguments and the server supplies the
//! claims of every auth service whose token verified. [`parse_params`] turns
//! both into [`ParamValues`]: type-checked, defaults applied, auth-sourced
//! values taken from claims. [`ordered_params`] then picks the positional
//! arguments for the driver in declaration order.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Verified claims keyed by auth service name.
pub type ClaimsMap = HashMap<String, Map<String, Value>>;

/// Type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    #[serde(alias = "object")]
    Map,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Map => "map",
        }
    }

    /// The JSON Schema `type` keyword for this parameter type.
    pub fn json_schema_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Map => "object",
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Array | Self::Map)
    }

    /// Check a JSON value against this type, without looking into containers.
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Map => value.is_object(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from a parameter to the claim that supplies its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamAuthService {
    /// Name of the auth service in the tools file.
    pub name: String,
    /// Claim field to read from the verified token.
    pub field: String,
}

/// A declared tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Parameter name. Empty only for array `items`.
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_required")]
    pub required: bool,

    /// Value used when the caller omits the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Claims that supply this parameter instead of the request body.
    #[serde(default, alias = "authSources", skip_serializing_if = "Vec::is_empty")]
    pub auth_services: Vec<ParamAuthService>,

    /// Element declaration for `array` parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Parameter>>,

    /// Optional value constraint for `map` parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ParamType>,
}

fn default_required() -> bool {
    true
}

impl Parameter {
    /// Create a required scalar parameter.
    pub fn new(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
            auth_services: Vec::new(),
            items: None,
            value_type: None,
        }
    }

    /// Create a required array parameter with the given element declaration.
    pub fn array(name: impl Into<String>, description: impl Into<String>, items: Parameter) -> Self {
        let mut param = Self::new(name, ParamType::Array, description);
        param.items = Some(Box::new(items));
        param
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_auth_service(mut self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.auth_services.push(ParamAuthService {
            name: name.into(),
            field: field.into(),
        });
        self
    }

    pub fn with_value_type(mut self, value_type: ParamType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// Whether the value comes from verified claims rather than the request.
    pub fn is_auth_sourced(&self) -> bool {
        !self.auth_services.is_empty()
    }

    /// Whether callers must supply a value.
    pub fn is_required(&self) -> bool {
        self.required && self.default.is_none()
    }

    /// Element type of an array parameter.
    pub fn items_type(&self) -> Option<ParamType> {
        self.items.as_ref().map(|i| i.param_type)
    }

    /// Check the declaration itself. Run once at config load.
    pub fn validate(&self) -> Result<(), String> {
        match self.param_type {
            ParamType::Array => {
                let items = self
                    .items
                    .as_ref()
                    .ok_or_else(|| format!("array parameter \"{}\" is missing \"items\"", self.name))?;
                items.validate()?;
            }
            ParamType::Map => {
                if let Some(vt) = self.value_type
                    && !vt.is_scalar()
                {
                    return Err(format!(
                        "map parameter \"{}\" has non-scalar valueType \"{}\"",
                        self.name, vt
                    ));
                }
            }
            _ => {
                if self.items.is_some() {
                    return Err(format!(
                        "parameter \"{}\" of type \"{}\" cannot declare \"items\"",
                        self.name, self.param_type
                    ));
                }
            }
        }

        if let Some(default) = &self.default {
            self.parse_value(default)
                .map_err(|e| format!("invalid default for parameter \"{}\": {}", self.name, e))?;
        }

        Ok(())
    }

    /// Type-check a supplied value against this declaration.
    pub fn parse_value(&self, value: &Value) -> Result<Value, ParamError> {
        check_value(&self.name, self.param_type, self.items.as_deref(), self.value_type, value)?;
        Ok(value.clone())
    }

    fn value_from_claims(&self, claims: &ClaimsMap) -> Result<Value, ParamError> {
        for service in &self.auth_services {
            if let Some(service_claims) = claims.get(&service.name) {
                return service_claims
                    .get(&service.field)
                    .cloned()
                    .ok_or_else(|| ParamError::MissingClaim {
                        name: self.name.clone(),
                        field: service.field.clone(),
                    });
            }
        }
        Err(ParamError::Unauthenticated {
            name: self.name.clone(),
        })
    }
}

fn check_value(
    label: &str,
    param_type: ParamType,
    items: Option<&Parameter>,
    value_type: Option<ParamType>,
    value: &Value,
) -> Result<(), ParamError> {
    if !param_type.matches(value) {
        return Err(ParamError::InvalidType {
            name: label.to_string(),
            expected: param_type,
        });
    }

    match (param_type, value) {
        (ParamType::Array, Value::Array(elements)) => {
            if let Some(items) = items {
                for (idx, element) in elements.iter().enumerate() {
                    check_value(
                        &format!("{}[{}]", label, idx),
                        items.param_type,
                        items.items.as_deref(),
                        items.value_type,
                        element,
                    )?;
                }
            }
        }
        (ParamType::Map, Value::Object(entries)) => {
            if let Some(vt) = value_type {
                for (key, entry) in entries {
                    if !vt.matches(entry) {
                        return Err(ParamError::InvalidType {
                            name: format!("{}.{}", label, key),
                            expected: vt,
                        });
                    }
                }
            }
        }
        _ => {}
    }

    Ok(())
}

/// A resolved parameter value together with the type it was declared with.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamValue {
    pub name: String,
    pub param_type: ParamType,
    /// Element type, for arrays.
    pub items_type: Option<ParamType>,
    pub value: Value,
}

impl ParamValue {
    fn from_param(param: &Parameter, value: Value) -> Self {
        Self {
            name: param.name.clone(),
            param_type: param.param_type,
            items_type: param.items_type(),
            value,
        }
    }
}

/// Ordered resolved values for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamValues(Vec<ParamValue>);

impl ParamValues {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[ParamValue] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParamValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ParamValues {
    type Item = &'a ParamValue;
    type IntoIter = std::slice::Iter<'a, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Request-time parameter errors. These are the caller's fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("parameter \"{name}\" is required")]
    Required { name: String },

    #[error("\"{name}\" not type \"{expected}\"")]
    InvalidType { name: String, expected: ParamType },

    #[error("missing or invalid authentication header for parameter \"{name}\"")]
    Unauthenticated { name: String },

    #[error("no field named \"{field}\" in claims for parameter \"{name}\"")]
    MissingClaim { name: String, field: String },

    #[error("missing parameter \"{name}\"")]
    Missing { name: String },
}

impl ParamError {
    /// The offending parameter name.
    pub fn parameter(&self) -> &str {
        match self {
            Self::Required { name }
            | Self::InvalidType { name, .. }
            | Self::Unauthenticated { name }
            | Self::MissingClaim { name, .. }
            | Self::Missing { name } => name,
        }
    }
}

/// Resolve request arguments and verified claims against declared parameters.
///
/// Auth-sourced parameters ignore any value in `data`. A missing or `null`
/// value falls back to the default, then to `null` for optional parameters.
pub fn parse_params(
    params: &[Parameter],
    data: &Map<String, Value>,
    claims: &ClaimsMap,
) -> Result<ParamValues, ParamError> {
    let mut values = Vec::with_capacity(params.len());

    for param in params {
        let supplied = if param.is_auth_sourced() {
            Some(param.value_from_claims(claims)?)
        } else {
            data.get(&param.name).filter(|v| !v.is_null()).cloned()
        };

        let value = match supplied {
            Some(v) => param.parse_value(&v)?,
            None => match &param.default {
                Some(default) => default.clone(),
                None if param.required => {
                    return Err(ParamError::Required {
                        name: param.name.clone(),
                    });
                }
                None => Value::Null,
            },
        };

        values.push(ParamValue::from_param(param, value));
    }

    Ok(ParamValues(values))
}

/// Pick the values of `params` out of `values`, in the order `params` were declared.
///
/// This is the positional argument list handed to the driver.
pub fn ordered_params(params: &[Parameter], values: &ParamValues) -> Result<ParamValues, ParamError> {
    params
        .iter()
        .map(|p| {
            values.get(&p.name).cloned().ok_or_else(|| ParamError::Missing {
                name: p.name.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ParamValues)
}

/// Concatenate `parameters` and `template_parameters`, rejecting shared names.
pub fn combine_parameters(
    parameters: &[Parameter],
    template_parameters: &[Parameter],
) -> Result<Vec<Parameter>, ConfigError> {
    let mut seen = HashSet::new();
    let mut all = Vec::with_capacity(parameters.len() + template_parameters.len());

    for param in parameters.iter().chain(template_parameters) {
        if !seen.insert(param.name.as_str()) {
            return Err(ConfigError::DuplicateParameter {
                name: param.name.clone(),
            });
        }
        all.push(param.clone());
    }

    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_required_parameter_missing() {
        let params = vec![Parameter::new("id", ParamType::Integer, "user id")];
        let err = parse_params(&params, &Map::new(), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err, ParamError::Required { name: "id".into() });
        assert_eq!(err.to_string(), "parameter \"id\" is required");
    }

    #[test]
    fn test_explicit_null_counts_as_missing() {
        let params = vec![Parameter::new("id", ParamType::Integer, "user id")];
        let err = parse_params(&params, &args(json!({"id": null})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err.parameter(), "id");
    }

    #[test]
    fn test_default_applied() {
        let params = vec![Parameter::new("limit", ParamType::Integer, "row limit").with_default(json!(10))];
        let values = parse_params(&params, &Map::new(), &ClaimsMap::new()).unwrap();
        assert_eq!(values.get("limit").unwrap().value, json!(10));
    }

    #[test]
    fn test_optional_without_default_is_null() {
        let params = vec![Parameter::new("name", ParamType::String, "user name").optional()];
        let values = parse_params(&params, &Map::new(), &ClaimsMap::new()).unwrap();
        assert_eq!(values.get("name").unwrap().value, Value::Null);
        assert_eq!(values.get("name").unwrap().param_type, ParamType::String);
    }

    #[test]
    fn test_integer_rejects_fractional_and_strings() {
        let params = vec![Parameter::new("id", ParamType::Integer, "user id")];
        for bad in [json!(1.5), json!("1"), json!(true)] {
            let err = parse_params(&params, &args(json!({ "id": bad })), &ClaimsMap::new()).unwrap_err();
            assert_eq!(err.to_string(), "\"id\" not type \"integer\"");
        }
    }

    #[test]
    fn test_float_accepts_integers() {
        let params = vec![Parameter::new("ratio", ParamType::Float, "ratio")];
        let values = parse_params(&params, &args(json!({"ratio": 2})), &ClaimsMap::new()).unwrap();
        assert_eq!(values.get("ratio").unwrap().value, json!(2));
    }

    #[test]
    fn test_array_items_checked_with_index() {
        let params = vec![Parameter::array(
            "ids",
            "ids",
            Parameter::new("id", ParamType::Integer, "one id"),
        )];
        let err = parse_params(&params, &args(json!({"ids": [1, "two", 3]})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "\"ids[1]\" not type \"integer\"");

        let ok = parse_params(&params, &args(json!({"ids": [1, 2]})), &ClaimsMap::new()).unwrap();
        assert_eq!(ok.get("ids").unwrap().items_type, Some(ParamType::Integer));
    }

    #[test]
    fn test_map_value_type() {
        let params = vec![Parameter::new("labels", ParamType::Map, "labels").with_value_type(ParamType::String)];
        let err = parse_params(&params, &args(json!({"labels": {"a": "x", "b": 2}})), &ClaimsMap::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "\"labels.b\" not type \"string\"");
    }

    #[test]
    fn test_auth_parameter_from_claims_ignores_body() {
        let params = vec![Parameter::new("email", ParamType::String, "caller email")
            .with_auth_service("my-auth", "email")];
        let mut claims = ClaimsMap::new();
        claims.insert(
            "my-auth".into(),
            args(json!({"email": "alice@example.com"})),
        );

        let values = parse_params(&params, &args(json!({"email": "mallory@example.com"})), &claims).unwrap();
        assert_eq!(values.get("email").unwrap().value, json!("alice@example.com"));
    }

    #[test]
    fn test_auth_parameter_without_claims() {
        let params = vec![Parameter::new("email", ParamType::String, "caller email")
            .with_auth_service("my-auth", "email")];
        let err = parse_params(&params, &args(json!({"email": "x"})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err, ParamError::Unauthenticated { name: "email".into() });

        let mut claims = ClaimsMap::new();
        claims.insert("my-auth".into(), args(json!({"sub": "123"})));
        let err = parse_params(&params, &Map::new(), &claims).unwrap_err();
        assert!(matches!(err, ParamError::MissingClaim { .. }));
    }

    #[test]
    fn test_ordered_params_follow_declaration_order() {
        let declared = vec![
            Parameter::new("name", ParamType::String, "name"),
            Parameter::new("id", ParamType::Integer, "id"),
        ];
        let values = ParamValues::new(vec![
            ParamValue::from_param(&declared[1], json!(3)),
            ParamValue::from_param(&Parameter::new("table", ParamType::String, "t"), json!("users")),
            ParamValue::from_param(&declared[0], json!("Alice")),
        ]);

        let ordered = ordered_params(&declared, &values).unwrap();
        let names: Vec<_> = ordered.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["name", "id"]);
    }

    #[test]
    fn test_combine_rejects_duplicates() {
        let params = vec![Parameter::new("table", ParamType::String, "t")];
        let templates = vec![Parameter::new("table", ParamType::String, "t")];
        let err = combine_parameters(&params, &templates).unwrap_err();
        assert!(err.to_string().contains("table"));
    }

    #[test]
    fn test_validate_rejects_bad_default_and_missing_items() {
        let bad_default = Parameter::new("id", ParamType::Integer, "id").with_default(json!("x"));
        assert!(bad_default.validate().is_err());

        let no_items = Parameter::new("ids", ParamType::Array, "ids");
        assert!(no_items.validate().unwrap_err().contains("items"));
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
- name: id
  type: integer
  description: user ID
- name: tags
  type: array
  description: tags
  required: false
  items:
    name: tag
    type: string
    description: a tag
- name: email
  type: string
  description: caller
  authSources:
    - name: my-auth
      field: email
"#;
        let params: Vec<Parameter> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(params[0], Parameter::new("id", ParamType::Integer, "user ID"));
        assert!(!params[1].required);
        assert_eq!(params[1].items_type(), Some(ParamType::String));
        assert_eq!(params[2].auth_services[0].field, "email");
    }
}
