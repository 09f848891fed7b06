//! Conversions between rows and SQLite values.

use crate::data::record::Record;
use crate::data::schema::{ColumnType, infer_value_type};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::Value;

/// Quote an identifier for SQLite (`"name"` with embedded quotes doubled).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column names across all rows, in first-appearance order.
pub fn union_columns(rows: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Declared SQLite type for a column, derived from the non-null cells.
pub fn column_affinity(rows: &[Record], column: &str) -> &'static str {
    let mut seen: Option<ColumnType> = None;
    for row in rows {
        let t = infer_value_type(row.get(column));
        if t == ColumnType::Null {
            continue;
        }
        match seen {
            None => seen = Some(t),
            Some(prev) if prev == t => {}
            Some(ColumnType::Integer) if t == ColumnType::Float => seen = Some(ColumnType::Float),
            Some(ColumnType::Float) if t == ColumnType::Integer => {}
            Some(_) => return "",
        }
    }
    match seen {
        Some(ColumnType::Integer | ColumnType::Boolean) => "INTEGER",
        Some(ColumnType::Float) => "REAL",
        Some(_) => "TEXT",
        None => "",
    }
}

/// Convert a cell for binding. Arrays and objects are stored as JSON text.
pub fn to_sql_value(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

/// Convert a result cell back into a JSON value.
pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Value::String("<blob>".to_string()),
    }
}

/// Render a cell as an SQL literal for script output.
pub fn to_sql_literal(value: Option<&Value>) -> String {
    match to_sql_value(value) {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => {
            let text = f.to_string();
            if text.contains(['.', 'e', 'E']) || !f.is_finite() {
                text
            } else {
                format!("{text}.0")
            }
        }
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Blob(_) => "NULL".to_string(),
    }
}
