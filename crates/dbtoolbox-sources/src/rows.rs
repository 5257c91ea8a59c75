//! Row materialization.
//!
//! Each driver row becomes a JSON object with the columns in the order the
//! driver returned them. Values are decoded according to the type name the
//! driver reports for the column, so JSON columns come back as structured
//! JSON and text columns as strings even when the wire hands over bytes.

use crate::error::{Result, SourceError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bigdecimal::ToPrimitive;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value, json};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::types::{PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind, PgValueFormat};
use sqlx::sqlite::SqliteRow;
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tiberius::{ColumnData, FromSql};

/// One materialized row.
pub type JsonRow = Map<String, Value>;

pub(crate) fn naive_datetime(v: NaiveDateTime) -> Value {
    json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn decimal(v: BigDecimal) -> Value {
    v.to_f64().map(Value::from).unwrap_or(Value::Null)
}

pub(crate) fn bytes(v: Vec<u8>) -> Value {
    json!(BASE64.encode(v))
}

pub(crate) fn row_error<E>(column: &str) -> impl FnOnce(E) -> SourceError + '_
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |error| SourceError::Row {
        column: column.to_string(),
        error: Box::new(error),
    }
}

// Postgres

fn interval(v: PgInterval) -> Value {
    let years = v.months / 12;
    let months = v.months % 12;
    let negative = v.microseconds < 0;
    let micros = v.microseconds.unsigned_abs();
    let (secs, frac) = (micros / 1_000_000, micros % 1_000_000);
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);

    let mut out = String::from("P");
    for (n, unit) in [(years, 'Y'), (months, 'M'), (v.days, 'D')] {
        if n != 0 {
            out.push_str(&format!("{n}{unit}"));
        }
    }
    if micros != 0 {
        let sign = if negative { "-" } else { "" };
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{sign}{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{sign}{minutes}M"));
        }
        if seconds != 0 || frac != 0 {
            let fraction = if frac == 0 {
                String::new()
            } else {
                format!(".{frac:06}").trim_end_matches('0').to_string()
            };
            out.push_str(&format!("{sign}{seconds}{fraction}S"));
        }
    }
    if out.len() == 1 {
        out.push_str("T0S");
    }
    json!(out)
}

/// `MONEY` travels as an integer count of the locale's minor unit. Two
/// fractional digits covers every common `lc_monetary`.
fn money(v: PgMoney) -> Value {
    decimal(v.to_bigdecimal(2))
}

fn timetz(v: PgTimeTz<NaiveTime, FixedOffset>) -> Value {
    json!(format!("{}{}", v.time, v.offset))
}

fn pg_array<T>(values: Vec<Option<T>>, f: impl Fn(T) -> Value) -> Value {
    Value::Array(values.into_iter().map(|v| v.map(&f).unwrap_or(Value::Null)).collect())
}

/// Text-like types whose binary wire form is the text itself.
fn pg_is_textual(ty: &PgTypeInfo) -> bool {
    matches!(
        ty.name(),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "\"CHAR\"" | "XML" | "UNKNOWN" | "citext"
    ) || matches!(ty.kind(), PgTypeKind::Enum(_))
}

fn pg_value(
    row: &PgRow,
    idx: usize,
    ty: &PgTypeInfo,
    format: PgValueFormat,
) -> std::result::Result<Value, sqlx::Error> {
    let binary = format == PgValueFormat::Binary;
    let value = match ty.name() {
        "BOOL" => json!(row.try_get_unchecked::<bool, _>(idx)?),
        "INT2" => json!(row.try_get_unchecked::<i16, _>(idx)?),
        "INT4" => json!(row.try_get_unchecked::<i32, _>(idx)?),
        "INT8" => json!(row.try_get_unchecked::<i64, _>(idx)?),
        "OID" => json!(row.try_get_unchecked::<sqlx::postgres::types::Oid, _>(idx)?.0),
        "FLOAT4" => json!(row.try_get_unchecked::<f32, _>(idx)?),
        "FLOAT8" => json!(row.try_get_unchecked::<f64, _>(idx)?),
        "NUMERIC" => decimal(row.try_get_unchecked::<BigDecimal, _>(idx)?),
        "JSON" | "JSONB" => row.try_get_unchecked::<Value, _>(idx)?,
        "UUID" => json!(row.try_get_unchecked::<Uuid, _>(idx)?.to_string()),
        "DATE" => json!(row.try_get_unchecked::<NaiveDate, _>(idx)?.to_string()),
        "TIME" => json!(row.try_get_unchecked::<NaiveTime, _>(idx)?.to_string()),
        "TIMETZ" => timetz(row.try_get_unchecked::<PgTimeTz<NaiveTime, FixedOffset>, _>(idx)?),
        "TIMESTAMP" => naive_datetime(row.try_get_unchecked::<NaiveDateTime, _>(idx)?),
        "TIMESTAMPTZ" => json!(row.try_get_unchecked::<DateTime<Utc>, _>(idx)?.to_rfc3339()),
        // The simple protocol sends these as the server's text rendering.
        "INTERVAL" if binary => interval(row.try_get_unchecked::<PgInterval, _>(idx)?),
        "MONEY" if binary => money(row.try_get_unchecked::<PgMoney, _>(idx)?),
        "INET" | "CIDR" => json!(row.try_get_unchecked::<IpNetwork, _>(idx)?.to_string()),
        "BYTEA" => bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        "VOID" => Value::Null,
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "BPCHAR[]" | "NAME[]" => {
            json!(row.try_get_unchecked::<Vec<Option<String>>, _>(idx)?)
        }
        "BOOL[]" => json!(row.try_get_unchecked::<Vec<Option<bool>>, _>(idx)?),
        "INT2[]" => json!(row.try_get_unchecked::<Vec<Option<i16>>, _>(idx)?),
        "INT4[]" => json!(row.try_get_unchecked::<Vec<Option<i32>>, _>(idx)?),
        "INT8[]" => json!(row.try_get_unchecked::<Vec<Option<i64>>, _>(idx)?),
        "FLOAT4[]" => json!(row.try_get_unchecked::<Vec<Option<f32>>, _>(idx)?),
        "FLOAT8[]" => json!(row.try_get_unchecked::<Vec<Option<f64>>, _>(idx)?),
        "NUMERIC[]" => pg_array(row.try_get_unchecked::<Vec<Option<BigDecimal>>, _>(idx)?, decimal),
        "UUID[]" => pg_array(row.try_get_unchecked::<Vec<Option<Uuid>>, _>(idx)?, |u| {
            json!(u.to_string())
        }),
        "DATE[]" => pg_array(row.try_get_unchecked::<Vec<Option<NaiveDate>>, _>(idx)?, |d| {
            json!(d.to_string())
        }),
        "TIME[]" => pg_array(row.try_get_unchecked::<Vec<Option<NaiveTime>>, _>(idx)?, |t| {
            json!(t.to_string())
        }),
        "TIMESTAMP[]" => pg_array(
            row.try_get_unchecked::<Vec<Option<NaiveDateTime>>, _>(idx)?,
            naive_datetime,
        ),
        "TIMESTAMPTZ[]" => pg_array(row.try_get_unchecked::<Vec<Option<DateTime<Utc>>>, _>(idx)?, |t| {
            json!(t.to_rfc3339())
        }),
        "INTERVAL[]" if binary => pg_array(row.try_get_unchecked::<Vec<Option<PgInterval>>, _>(idx)?, interval),
        "INET[]" | "CIDR[]" => pg_array(row.try_get_unchecked::<Vec<Option<IpNetwork>>, _>(idx)?, |n| {
            json!(n.to_string())
        }),
        "BYTEA[]" => pg_array(row.try_get_unchecked::<Vec<Option<Vec<u8>>>, _>(idx)?, bytes),
        "JSON[]" | "JSONB[]" => json!(row.try_get_unchecked::<Vec<Option<Value>>, _>(idx)?),
        _ if !binary || pg_is_textual(ty) => json!(row.try_get_unchecked::<String, _>(idx)?),
        other => {
            return Err(sqlx::Error::Decode(
                format!("unsupported column type {other}").into(),
            ));
        }
    };
    Ok(value)
}

/// Materialize a Postgres row.
///
/// Prepared statements return binary values, which are decoded per type.
/// `execute-sql` runs over the simple protocol, where every value is text and
/// types without a JSON mapping come back as the server renders them.
pub fn pg_row_to_json(row: &PgRow) -> Result<JsonRow> {
    let mut obj = Map::new();

    for col in row.columns() {
        let idx = col.ordinal();
        let raw = row.try_get_raw(idx).map_err(row_error(col.name()))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let format = raw.format();
            pg_value(row, idx, col.type_info(), format).map_err(row_error(col.name()))?
        };
        obj.insert(col.name().to_string(), value);
    }

    Ok(obj)
}

// MySQL, TiDB and MindsDB

fn mysql_value(row: &MySqlRow, idx: usize, type_name: &str) -> std::result::Result<Value, sqlx::Error> {
    let value = match type_name {
        // TINYINT(1) is reported as BOOLEAN but the server sends an integer.
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            json!(row.try_get_unchecked::<i64, _>(idx)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "BIT" => json!(row.try_get_unchecked::<u64, _>(idx)?),
        "FLOAT" => json!(row.try_get_unchecked::<f32, _>(idx)?),
        "DOUBLE" => json!(row.try_get_unchecked::<f64, _>(idx)?),
        "DECIMAL" => decimal(row.try_get_unchecked::<BigDecimal, _>(idx)?),
        "JSON" => row.try_get_unchecked::<Value, _>(idx)?,
        "DATE" => json!(row.try_get_unchecked::<NaiveDate, _>(idx)?.to_string()),
        "TIME" => json!(row.try_get_unchecked::<NaiveTime, _>(idx)?.to_string()),
        "DATETIME" => naive_datetime(row.try_get_unchecked::<NaiveDateTime, _>(idx)?),
        "TIMESTAMP" => json!(row.try_get_unchecked::<DateTime<Utc>, _>(idx)?.to_rfc3339()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "GEOMETRY" => {
            bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?)
        }
        "NULL" => Value::Null,
        // CHAR, VARCHAR, TEXT variants, ENUM and SET arrive as bytes; keep them as strings.
        _ => {
            let raw = row.try_get_unchecked::<Vec<u8>, _>(idx)?;
            json!(String::from_utf8_lossy(&raw))
        }
    };
    Ok(value)
}

/// Materialize a row from any MySQL-protocol source.
pub fn mysql_row_to_json(row: &MySqlRow) -> Result<JsonRow> {
    let mut obj = Map::new();

    for col in row.columns() {
        let idx = col.ordinal();
        let raw = row.try_get_raw(idx).map_err(row_error(col.name()))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            mysql_value(row, idx, col.type_info().name()).map_err(row_error(col.name()))?
        };
        obj.insert(col.name().to_string(), value);
    }

    Ok(obj)
}

// SQL Server

fn mssql_value(data: ColumnData<'static>) -> std::result::Result<Value, tiberius::error::Error> {
    let value = match &data {
        ColumnData::U8(v) => json!(v),
        ColumnData::I16(v) => json!(v),
        ColumnData::I32(v) => json!(v),
        ColumnData::I64(v) => json!(v),
        ColumnData::F32(v) => json!(v),
        ColumnData::F64(v) => json!(v),
        ColumnData::Bit(v) => json!(v),
        ColumnData::String(v) => json!(v),
        ColumnData::Guid(v) => json!(v.map(|g| g.to_string())),
        ColumnData::Numeric(v) => json!(v.map(f64::from)),
        ColumnData::Binary(v) => v.as_ref().map(|b| bytes(b.to_vec())).unwrap_or(Value::Null),
        ColumnData::Xml(v) => json!(v.as_ref().map(|x| x.clone().into_owned().into_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)?.map(naive_datetime).unwrap_or(Value::Null)
        }
        ColumnData::Date(_) => json!(NaiveDate::from_sql(&data)?.map(|d| d.to_string())),
        ColumnData::Time(_) => json!(NaiveTime::from_sql(&data)?.map(|t| t.to_string())),
        ColumnData::DateTimeOffset(_) => {
            json!(DateTime::<FixedOffset>::from_sql(&data)?.map(|t| t.to_rfc3339()))
        }
    };
    Ok(value)
}

/// Materialize a SQL Server row. NULLs arrive as `None` payloads of the
/// column's own type.
pub fn mssql_row_to_json(row: tiberius::Row) -> Result<JsonRow> {
    let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let mut obj = Map::new();

    for (name, data) in names.into_iter().zip(row) {
        let value = mssql_value(data).map_err(row_error(&name))?;
        obj.insert(name, value);
    }

    Ok(obj)
}

// SQLite

fn sqlite_value(
    row: &SqliteRow,
    idx: usize,
    storage: &str,
    declared: &str,
) -> std::result::Result<Value, sqlx::Error> {
    let value = match (storage, declared) {
        ("INTEGER", "BOOLEAN") => json!(row.try_get_unchecked::<bool, _>(idx)?),
        ("INTEGER", _) => json!(row.try_get_unchecked::<i64, _>(idx)?),
        ("REAL", _) => json!(row.try_get_unchecked::<f64, _>(idx)?),
        ("BLOB", _) => bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        ("NULL", _) => Value::Null,
        _ => json!(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}

/// Materialize a SQLite row.
///
/// SQLite is dynamically typed, so the storage class of each value decides
/// the decoding. The declared column type only matters for `BOOLEAN`.
pub fn sqlite_row_to_json(row: &SqliteRow) -> Result<JsonRow> {
    let mut obj = Map::new();

    for col in row.columns() {
        let idx = col.ordinal();
        let raw = row.try_get_raw(idx).map_err(row_error(col.name()))?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_string();
            sqlite_value(row, idx, &storage, col.type_info().name()).map_err(row_error(col.name()))?
        };
        obj.insert(col.name().to_string(), value);
    }

    Ok(obj)
}
