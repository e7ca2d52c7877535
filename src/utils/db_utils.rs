use actix_web::error::ErrorBadRequest;
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;

use crate::report::window::parse_local_date;

/// How a column accepts JSON values in a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Nullable text; blank clears it
    Text,
    /// NOT NULL text; null and blank are rejected
    RequiredText,
    Date,
}

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Date(NaiveDate),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn convert(column: &str, kind: ColumnKind, value: &Value) -> Result<SqlValue, actix_web::Error> {
    match (kind, value) {
        (ColumnKind::RequiredText, Value::String(s)) if !s.trim().is_empty() => {
            Ok(SqlValue::String(s.trim().to_string()))
        }
        (ColumnKind::RequiredText, Value::Null | Value::String(_)) => {
            Err(ErrorBadRequest(format!("{column} must not be empty")))
        }
        (_, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Text, Value::String(s)) if s.trim().is_empty() => Ok(SqlValue::Null),
        (ColumnKind::Text, Value::String(s)) => Ok(SqlValue::String(s.trim().to_string())),
        (ColumnKind::Date, Value::String(s)) => parse_local_date(s)
            .map(SqlValue::Date)
            .ok_or_else(|| ErrorBadRequest(format!("{column} must be a YYYY-MM-DD date"))),
        _ => Err(ErrorBadRequest(format!("Unsupported value for {column}"))),
    }
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `columns` may appear in the payload.
pub fn build_update_sql(
    table: &str,
    columns: &[(&str, ColumnKind)],
    payload: &Value,
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let (column, kind) = columns
            .iter()
            .find(|(name, _)| *name == key.as_str())
            .ok_or_else(|| ErrorBadRequest(format!("Field {key} cannot be updated")))?;

        assignments.push(format!("{column} = ?"));
        values.push(convert(column, *kind, value)?);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        assignments.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}
