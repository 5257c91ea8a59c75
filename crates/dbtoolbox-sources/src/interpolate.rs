//! Client-side literal interpolation for sources without prepared statements.
//!
//! MindsDB speaks the MySQL wire protocol but cannot prepare statements, so
//! `?` placeholders are replaced with SQL literals before the statement is
//! sent over the text protocol. Placeholders inside quoted strings, quoted
//! identifiers and comments are left alone.

use crate::error::{Result, SourceError};
use dbtoolbox_core::ParamValues;
use serde_json::Value;

/// Render a JSON value as a SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Replace each `?` placeholder in `statement` with the next value of `params`.
///
/// The number of placeholders must match the number of values.
pub fn interpolate_params(statement: &str, params: &ParamValues) -> Result<String> {
    let mut values = params.iter();
    let mut out = String::with_capacity(statement.len() + params.len() * 8);
    let mut placeholders = 0usize;
    let mut chars = statement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                copy_quoted(&mut chars, &mut out, c);
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                copy_until_newline(&mut chars, &mut out);
            }
            '#' => {
                out.push(c);
                copy_until_newline(&mut chars, &mut out);
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                copy_block_comment(&mut chars, &mut out);
            }
            '?' => {
                placeholders += 1;
                match values.next() {
                    Some(p) => out.push_str(&sql_literal(&p.value)),
                    None => {
                        return Err(SourceError::Interpolate(format!(
                            "statement has more placeholders than the {} supplied parameters",
                            params.len()
                        )));
                    }
                }
            }
            c => out.push(c),
        }
    }

    if placeholders != params.len() {
        return Err(SourceError::Interpolate(format!(
            "statement has {} placeholders but {} parameters were supplied",
            placeholders,
            params.len()
        )));
    }

    Ok(out)
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn copy_quoted(chars: &mut Chars<'_>, out: &mut String, quote: char) {
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '\\' && quote != '`' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else if c == quote {
            // A doubled quote is an escaped quote, not the end of the literal.
            if chars.peek() == Some(&quote) {
                if let Some(q) = chars.next() {
                    out.push(q);
                }
            } else {
                return;
            }
        }
    }
}

fn copy_until_newline(chars: &mut Chars<'_>, out: &mut String) {
    for c in chars.by_ref() {
        out.push(c);
        if c == '\n' {
            return;
        }
    }
}

fn copy_block_comment(chars: &mut Chars<'_>, out: &mut String) {
    let mut prev = '\0';
    for c in chars.by_ref() {
        out.push(c);
        if prev == '*' && c == '/' {
            return;
        }
        prev = c;
    }
}
