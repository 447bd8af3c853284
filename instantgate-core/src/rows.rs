//! Statement execution and row materialization.
//!
//! Compiled statements are executed against the pool and each result row is
//! converted into an ordered mapping of column name to JSON value. The
//! materializer trusts the result set's own column list rather than the
//! schema cache, so it stays correct even if the schema drifts mid-query.
//! Byte-string cells become text, temporal cells become RFC-3339/ISO
//! strings, and SQL `NULL` is preserved as JSON null.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::{GateError, Result};
use crate::query::builder::BoundStatement;
use crate::query::filter::ScalarValue;

/// Result of executing a write statement.
#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

/// A materialized row: result-set column order is preserved.
pub type RowObject = Map<String, Value>;

/// Executes a SELECT and materializes every row.
pub async fn fetch_rows(pool: &MySqlPool, statement: &BoundStatement) -> Result<Vec<RowObject>> {
    let query = bind_params(sqlx::query(&statement.sql), &statement.params);
    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| GateError::execution("failed to execute query", e))?;

    rows.iter().map(row_to_object).collect()
}

/// Executes a COUNT statement and returns the scalar total.
pub async fn fetch_count(pool: &MySqlPool, statement: &BoundStatement) -> Result<i64> {
    let query = bind_params(sqlx::query(&statement.sql), &statement.params);
    let row = query
        .fetch_one(pool)
        .await
        .map_err(|e| GateError::execution("failed to execute count query", e))?;

    row.try_get::<i64, _>(0)
        .map_err(|e| GateError::execution("failed to read count result", e))
}

/// Executes an INSERT/UPDATE/DELETE.
pub async fn execute(pool: &MySqlPool, statement: &BoundStatement) -> Result<WriteOutcome> {
    let query = bind_params(sqlx::query(&statement.sql), &statement.params);
    let result = query
        .execute(pool)
        .await
        .map_err(|e| GateError::execution("failed to execute statement", e))?;

    Ok(WriteOutcome {
        rows_affected: result.rows_affected(),
        last_insert_id: result.last_insert_id(),
    })
}

/// Binds scalar values positionally onto a query.
fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[ScalarValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in params {
        query = match value {
            ScalarValue::Null => query.bind(Option::<String>::None),
            ScalarValue::Bool(b) => query.bind(*b),
            ScalarValue::Int(i) => query.bind(*i),
            ScalarValue::Float(f) => query.bind(*f),
            ScalarValue::Text(s) => query.bind(s.clone()),
            ScalarValue::DateTime(ts) => query.bind(*ts),
            ScalarValue::Date(date) => query.bind(*date),
        };
    }
    query
}

/// Converts one row into an ordered column → value mapping.
fn row_to_object(row: &MySqlRow) -> Result<RowObject> {
    let mut object = Map::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, index, column.type_info().name())?;
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

/// Decodes one cell by the driver-reported type name.
fn decode_cell(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| GateError::execution("failed to read result cell", e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let unsigned = type_name.ends_with(" UNSIGNED");
    let base = type_name.strip_suffix(" UNSIGNED").unwrap_or(type_name);

    let value = match base {
        "BOOLEAN" => Value::Bool(get::<bool>(row, index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            if unsigned {
                Value::Number(Number::from(get::<u64>(row, index)?))
            } else {
                Value::Number(Number::from(get::<i64>(row, index)?))
            }
        }
        "BIT" => Value::Number(Number::from(get::<u64>(row, index)?)),
        "FLOAT" => float_value(f64::from(get::<f32>(row, index)?)),
        "DOUBLE" => float_value(get::<f64>(row, index)?),
        // DECIMAL is surfaced as text to avoid precision loss.
        "DECIMAL" => Value::String(get::<String>(row, index)?),
        "DATE" => Value::String(get::<NaiveDate>(row, index)?.to_string()),
        "TIME" => Value::String(get::<NaiveTime>(row, index)?.to_string()),
        "DATETIME" => Value::String(
            get::<NaiveDateTime>(row, index)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "TIMESTAMP" => Value::String(get::<DateTime<Utc>>(row, index)?.to_rfc3339()),
        "JSON" => get::<Value>(row, index)?,
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            Value::String(get::<String>(row, index)?)
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            Value::String(String::from_utf8_lossy(&get::<Vec<u8>>(row, index)?).into_owned())
        }
        _ => fallback_decode(row, index),
    };

    Ok(value)
}

fn get<'r, T>(row: &'r MySqlRow, index: usize) -> Result<T>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get::<T, _>(index)
        .map_err(|e| GateError::execution("failed to decode result cell", e))
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Last-resort decode for types outside the known set.
fn fallback_decode(row: &MySqlRow, index: usize) -> Value {
    if let Ok(text) = row.try_get::<String, _>(index) {
        return Value::String(text);
    }
    if let Ok(bytes) = row.try_get::<Vec<u8>, _>(index) {
        return Value::String(String::from_utf8_lossy(&bytes).into_owned());
    }
    Value::Null
}
