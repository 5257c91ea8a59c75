//! Template parameter substitution.
//!
//! Template parameters are spliced into the statement text before any driver
//! binding happens, so they can stand in identifier positions (table or column
//! names) where a placeholder is not allowed. Two actions are understood:
//!
//! - `{{.name}}` inserts the value
//! - `{{array .name}}` inserts a string array joined with `", "`
//!
//! Whitespace inside the braces is ignored.

use crate::parameters::{Parameter, ParamValues};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unterminated template action at offset {0}")]
    Unterminated(usize),

    #[error("malformed template action \"{0}\"")]
    Malformed(String),

    #[error("unknown template function \"{0}\"")]
    UnknownFunction(String),

    #[error("template references undeclared parameter \"{0}\"")]
    UndeclaredName(String),

    #[error("template parameter \"{0}\" has no value")]
    MissingValue(String),

    #[error("template parameter \"{0}\" is an array; use {{{{array .{0}}}}}")]
    ArrayWithoutFunction(String),

    #[error("template function \"array\" requires a string array, \"{name}\" is {found}")]
    NotStringArray { name: String, found: &'static str },

    #[error("template parameter \"{0}\" cannot be rendered as text")]
    Unrenderable(String),
}

enum Action<'a> {
    Value(&'a str),
    Join(&'a str),
}

fn field_name(word: &str) -> Option<&str> {
    word.strip_prefix('.')
        .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
}

fn parse_action(body: &str) -> Result<Action<'_>, TemplateError> {
    let body = body.trim();
    let mut words = body.split_whitespace();
    let malformed = || TemplateError::Malformed(body.to_string());

    match (words.next(), words.next(), words.next()) {
        (Some(first), None, None) if first.starts_with('.') => {
            field_name(first).map(Action::Value).ok_or_else(malformed)
        }
        (Some("array"), Some(arg), None) => field_name(arg).map(Action::Join).ok_or_else(malformed),
        (Some(func), Some(_), _) if !func.starts_with('.') => {
            Err(TemplateError::UnknownFunction(func.to_string()))
        }
        _ => Err(TemplateError::Malformed(body.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn render_value(name: &str, value: &Value) -> Result<String, TemplateError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(TemplateError::MissingValue(name.to_string())),
        Value::Array(_) => Err(TemplateError::ArrayWithoutFunction(name.to_string())),
        Value::Object(_) => Err(TemplateError::Unrenderable(name.to_string())),
    }
}

fn render_join(name: &str, value: &Value) -> Result<String, TemplateError> {
    let Value::Array(elements) = value else {
        return Err(TemplateError::NotStringArray {
            name: name.to_string(),
            found: json_kind(value),
        });
    };

    let parts = elements
        .iter()
        .map(|e| {
            e.as_str().ok_or_else(|| TemplateError::NotStringArray {
                name: name.to_string(),
                found: "an array with non-string elements",
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(parts.join(", "))
}

/// Render `statement` against a name → value map.
pub fn render(statement: &str, values: &Map<String, Value>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(statement.len());
    let mut rest = statement;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated(offset + start))?;

        let rendered = match parse_action(&after_open[..end])? {
            Action::Value(name) => {
                let value = values
                    .get(name)
                    .ok_or_else(|| TemplateError::UndeclaredName(name.to_string()))?;
                render_value(name, value)?
            }
            Action::Join(name) => {
                let value = values
                    .get(name)
                    .ok_or_else(|| TemplateError::UndeclaredName(name.to_string()))?;
                render_join(name, value)?
            }
        };
        out.push_str(&rendered);

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Substitute the declared template parameters into `statement`.
///
/// Only names listed in `template_params` are visible to the template, even
/// when `values` also carries ordinary parameters. With no template parameters
/// declared the statement is returned untouched.
pub fn resolve_template_params(
    template_params: &[Parameter],
    statement: &str,
    values: &ParamValues,
) -> Result<String, TemplateError> {
    if template_params.is_empty() {
        return Ok(statement.to_string());
    }

    let visible: Map<String, Value> = template_params
        .iter()
        .map(|p| {
            let value = values.get(&p.name).map(|v| v.value.clone()).unwrap_or(Value::Null);
            (p.name.clone(), value)
        })
        .collect();

    render(statement, &visible)
}
