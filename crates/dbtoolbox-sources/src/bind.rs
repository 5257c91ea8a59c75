//! Positional argument binding.
//!
//! Values are bound by their *declared* type, not by the shape of the JSON
//! value, so an omitted optional parameter still produces a NULL of the right
//! type. Postgres gets native arrays and `jsonb`; MySQL, SQL Server and
//! SQLite receive arrays and maps as JSON text.
//!
//! Postgres infers a placeholder's type from the bound value, so string
//! parameters compared against non-text columns need a cast in the statement
//! (`WHERE created >= $1::date`).

use crate::error::{Result, SourceError};
use dbtoolbox_core::{ParamType, ParamValue, ParamValues};
use serde_json::Value;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{Arguments, Database, Encode, Type};
use tiberius::Query;

fn args_add<'q, DB, A, T>(args: &mut A, name: &str, v: T) -> Result<()>
where
    DB: Database,
    A: Arguments<'q, Database = DB>,
    T: Encode<'q, DB> + Type<DB> + 'q,
{
    args.add(v).map_err(|e| SourceError::Bind {
        name: name.to_string(),
        message: e.to_string(),
    })
}

fn mismatch(param: &ParamValue) -> SourceError {
    SourceError::Bind {
        name: param.name.clone(),
        message: format!("value {} is not a valid {}", param.value, param.param_type),
    }
}

fn as_string(param: &ParamValue) -> Result<Option<String>> {
    match &param.value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(mismatch(param)),
    }
}

fn as_i64(param: &ParamValue) -> Result<Option<i64>> {
    match &param.value {
        Value::Null => Ok(None),
        v => v.as_i64().map(Some).ok_or_else(|| mismatch(param)),
    }
}

fn as_f64(param: &ParamValue) -> Result<Option<f64>> {
    match &param.value {
        Value::Null => Ok(None),
        v => v.as_f64().map(Some).ok_or_else(|| mismatch(param)),
    }
}

fn as_bool(param: &ParamValue) -> Result<Option<bool>> {
    match &param.value {
        Value::Null => Ok(None),
        v => v.as_bool().map(Some).ok_or_else(|| mismatch(param)),
    }
}

fn json_value(param: &ParamValue) -> Option<Value> {
    match &param.value {
        Value::Null => None,
        v => Some(v.clone()),
    }
}

fn as_json_text(param: &ParamValue) -> Option<String> {
    json_value(param).map(|v| v.to_string())
}

/// Collect array elements with `f`, or `None` when the parameter is NULL.
fn elements<T>(param: &ParamValue, f: impl Fn(&Value) -> Option<T>) -> Result<Option<Vec<T>>> {
    match &param.value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .iter()
            .map(|item| f(item).ok_or_else(|| mismatch(param)))
            .collect::<Result<Vec<_>>>()
            .map(Some),
        _ => Err(mismatch(param)),
    }
}

/// Build Postgres arguments (`$1`, `$2`, ...).
pub fn pg_arguments(params: &ParamValues) -> Result<PgArguments> {
    let mut args = PgArguments::default();

    for p in params {
        let name = p.name.as_str();
        match p.param_type {
            ParamType::String => args_add(&mut args, name, as_string(p)?)?,
            ParamType::Integer => args_add(&mut args, name, as_i64(p)?)?,
            ParamType::Float => args_add(&mut args, name, as_f64(p)?)?,
            ParamType::Boolean => args_add(&mut args, name, as_bool(p)?)?,
            ParamType::Map => args_add(&mut args, name, json_value(p).map(Json))?,
            ParamType::Array => match p.items_type {
                Some(ParamType::String) => {
                    args_add(&mut args, name, elements(p, |v| v.as_str().map(str::to_string))?)?
                }
                Some(ParamType::Integer) => args_add(&mut args, name, elements(p, Value::as_i64)?)?,
                Some(ParamType::Float) => args_add(&mut args, name, elements(p, Value::as_f64)?)?,
                Some(ParamType::Boolean) => args_add(&mut args, name, elements(p, Value::as_bool)?)?,
                Some(ParamType::Map) => {
                    args_add(&mut args, name, elements(p, |v| Some(Json(v.clone())))?)?
                }
                // Nested arrays have no native Postgres shape we can rely on.
                Some(ParamType::Array) | None => args_add(&mut args, name, json_value(p).map(Json))?,
            },
        }
    }

    Ok(args)
}

/// Build MySQL arguments (`?`).
pub fn mysql_arguments(params: &ParamValues) -> Result<MySqlArguments> {
    let mut args = MySqlArguments::default();

    for p in params {
        let name = p.name.as_str();
        match p.param_type {
            ParamType::String => args_add(&mut args, name, as_string(p)?)?,
            ParamType::Integer => args_add(&mut args, name, as_i64(p)?)?,
            ParamType::Float => args_add(&mut args, name, as_f64(p)?)?,
            ParamType::Boolean => args_add(&mut args, name, as_bool(p)?)?,
            ParamType::Array | ParamType::Map => args_add(&mut args, name, as_json_text(p))?,
        }
    }

    Ok(args)
}

/// Build a SQL Server query (`@P1`, `@P2`, ...) with every parameter bound.
pub fn mssql_query<'a>(statement: &'a str, params: &ParamValues) -> Result<Query<'a>> {
    let mut query = Query::new(statement);

    for p in params {
        match p.param_type {
            ParamType::String => query.bind(as_string(p)?),
            ParamType::Integer => query.bind(as_i64(p)?),
            ParamType::Float => query.bind(as_f64(p)?),
            ParamType::Boolean => query.bind(as_bool(p)?),
            ParamType::Array | ParamType::Map => query.bind(as_json_text(p)),
        }
    }

    Ok(query)
}

/// Build SQLite arguments (`?`, `?NNN`).
pub fn sqlite_arguments<'q>(params: &ParamValues) -> Result<SqliteArguments<'q>> {
    let mut args = SqliteArguments::default();

    for p in params {
        let name = p.name.as_str();
        match p.param_type {
            ParamType::String => args_add(&mut args, name, as_string(p)?)?,
            ParamType::Integer => args_add(&mut args, name, as_i64(p)?)?,
            ParamType::Float => args_add(&mut args, name, as_f64(p)?)?,
            ParamType::Boolean => args_add(&mut args, name, as_bool(p)?)?,
            ParamType::Array | ParamType::Map => args_add(&mut args, name, as_json_text(p))?,
        }
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(name: &str, param_type: ParamType, items_type: Option<ParamType>, value: Value) -> ParamValue {
        ParamValue {
            name: name.to_string(),
            param_type,
            items_type,
            value,
        }
    }

    #[test]
    fn test_bind_counts() {
        let params = ParamValues::new(vec![
            value("name", ParamType::String, None, json!("Alice")),
            value("age", ParamType::Integer, None, json!(30)),
            value("score", ParamType::Float, None, Value::Null),
            value("ids", ParamType::Array, Some(ParamType::Integer), json!([1, 2])),
            value("attrs", ParamType::Map, None, json!({"a": 1})),
        ]);

        assert_eq!(pg_arguments(&params).unwrap().len(), 5);
        assert_eq!(mysql_arguments(&params).unwrap().len(), 5);
        assert_eq!(sqlite_arguments(&params).unwrap().len(), 5);
    }

    #[test]
    fn test_bind_type_mismatch() {
        let params = ParamValues::new(vec![value("age", ParamType::Integer, None, json!("thirty"))]);
        let err = sqlite_arguments(&params).unwrap_err();
        assert!(err.to_string().starts_with("unable to bind parameter \"age\""));
    }

    #[test]
    fn test_mssql_query_binds_by_declared_type() {
        let params = ParamValues::new(vec![
            value("name", ParamType::String, None, json!("Alice")),
            value("tags", ParamType::Array, Some(ParamType::String), json!(["a"])),
        ]);
        assert!(mssql_query("SELECT @P1, @P2", &params).is_ok());

        let params = ParamValues::new(vec![value("active", ParamType::Boolean, None, json!("yes"))]);
        let err = mssql_query("SELECT @P1", &params).unwrap_err();
        assert!(err.to_string().starts_with("unable to bind parameter \"active\""));
    }

    #[test]
    fn test_bind_array_element_mismatch() {
        let params = ParamValues::new(vec![value(
            "ids",
            ParamType::Array,
            Some(ParamType::Integer),
            json!([1, "two"]),
        )]);
        assert!(pg_arguments(&params).is_err());
    }
}
