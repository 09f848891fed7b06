//! Schema definition and type inference for datasets.

use crate::data::record::{Record, as_number, compare_values, stringify_value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Array,
    Structured,
    Null,
    Mixed,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Array => "array",
            ColumnType::Structured => "structured",
            ColumnType::Null => "null",
            ColumnType::Mixed => "mixed",
        };
        f.write_str(name)
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: ColumnType,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, dtype: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            dtype,
            nullable,
        }
    }
}

/// Ordered column descriptors for a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnDescriptor>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Explicitly override a column's declared type. Adds the column when it
    /// is not declared yet.
    pub fn with_override(mut self, name: &str, dtype: ColumnType, nullable: bool) -> Self {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => {
                col.dtype = dtype;
                col.nullable = nullable;
            }
            None => self.columns.push(ColumnDescriptor::new(name, dtype, nullable)),
        }
        self
    }
}

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?)?$",
    )
    .expect("date pattern is valid")
});

/// True when `s` looks like an ISO date/datetime and actually parses as one.
pub fn is_date_string(s: &str) -> bool {
    if !DATE_PATTERN.is_match(s) {
        return false;
    }
    if s.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok();
    }
    DateTime::parse_from_rfc3339(s).is_ok()
        || DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z").is_ok()
        || DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%z").is_ok()
        || ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
}

/// Infer the type of a single cell. A missing cell is typed like null.
pub fn infer_value_type(value: Option<&Value>) -> ColumnType {
    match value {
        None | Some(Value::Null) => ColumnType::Null,
        Some(Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                ColumnType::Integer
            } else if n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0) {
                ColumnType::Integer
            } else {
                ColumnType::Float
            }
        }
        Some(Value::Bool(_)) => ColumnType::Boolean,
        Some(Value::Array(_)) => ColumnType::Array,
        Some(Value::Object(_)) => ColumnType::Structured,
        Some(Value::String(s)) => {
            if is_date_string(s) {
                ColumnType::Date
            } else {
                ColumnType::String
            }
        }
    }
}

/// Derive a schema from rows.
///
/// Candidate columns come from the first row's keys in order; keys that
/// only appear in later rows are not discovered. A column whose rows
/// disagree on type becomes `mixed`. Inferred columns are always nullable,
/// since the schema only describes the rows it was derived from.
pub fn infer_schema(rows: &[Record]) -> Schema {
    let Some(first) = rows.first() else {
        return Schema::empty();
    };

    let columns = first
        .keys()
        .map(|name| {
            let mut seen: Vec<ColumnType> = Vec::new();
            for row in rows {
                let t = infer_value_type(row.get(name));
                if !seen.contains(&t) {
                    seen.push(t);
                }
            }
            let dtype = if seen.len() > 1 {
                ColumnType::Mixed
            } else {
                seen.first().copied().unwrap_or(ColumnType::Null)
            };
            ColumnDescriptor::new(name.clone(), dtype, true)
        })
        .collect();

    Schema { columns }
}

/// Infer from at most `sample_rows` leading rows (`0` means all rows).
pub fn infer_schema_sampled(rows: &[Record], sample_rows: usize) -> Schema {
    if sample_rows == 0 || rows.len() <= sample_rows {
        infer_schema(rows)
    } else {
        infer_schema(&rows[..sample_rows])
    }
}

/// Statistics for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub null_count: usize,
    pub distinct_count: usize,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub mean: Option<f64>,
}

/// Compute summary statistics for one column.
pub fn column_stats(rows: &[Record], column: &str) -> ColumnStats {
    let mut null_count = 0;
    let mut distinct = HashSet::new();
    let mut min: Option<&Value> = None;
    let mut max: Option<&Value> = None;
    let mut sum = 0.0;
    let mut numeric = 0usize;

    for row in rows {
        let value = match row.get(column) {
            None | Some(Value::Null) => {
                null_count += 1;
                continue;
            }
            Some(v) => v,
        };
        distinct.insert(stringify_value(value));
        if min.is_none_or(|m| compare_values(value, m).is_lt()) {
            min = Some(value);
        }
        if max.is_none_or(|m| compare_values(value, m).is_gt()) {
            max = Some(value);
        }
        if let Some(n) = as_number(value) {
            sum += n;
            numeric += 1;
        }
    }

    ColumnStats {
        name: column.to_string(),
        null_count,
        distinct_count: distinct.len(),
        min: min.cloned(),
        max: max.cloned(),
        mean: (numeric > 0).then(|| sum / numeric as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::record;
    use serde_json::json;

    #[test]
    fn test_infer_empty() {
        assert_eq!(infer_schema(&[]), Schema { columns: vec![] });
    }

    #[test]
    fn test_infer_single_integer() {
        let schema = infer_schema(&[record([("a", json!(1))])]);
        assert_eq!(
            schema.columns[0],
            ColumnDescriptor::new("a", ColumnType::Integer, true)
        );
    }

    #[test]
    fn test_infer_value_types() {
        assert_eq!(infer_value_type(None), ColumnType::Null);
        assert_eq!(infer_value_type(Some(&json!(null))), ColumnType::Null);
        assert_eq!(infer_value_type(Some(&json!(3))), ColumnType::Integer);
        assert_eq!(infer_value_type(Some(&json!(3.0))), ColumnType::Integer);
        assert_eq!(infer_value_type(Some(&json!(3.5))), ColumnType::Float);
        assert_eq!(infer_value_type(Some(&json!(false))), ColumnType::Boolean);
        assert_eq!(infer_value_type(Some(&json!([1]))), ColumnType::Array);
        assert_eq!(infer_value_type(Some(&json!({"k": 1}))), ColumnType::Structured);
        assert_eq!(infer_value_type(Some(&json!("2024-02-29"))), ColumnType::Date);
        assert_eq!(
            infer_value_type(Some(&json!("2024-02-29T10:30:00Z"))),
            ColumnType::Date
        );
        assert_eq!(infer_value_type(Some(&json!("hello"))), ColumnType::String);
    }

    #[test]
    fn test_date_pattern_requires_real_date() {
        assert!(!is_date_string("2023-02-30"));
        assert!(!is_date_string("2023-13-01"));
        assert!(is_date_string("2023-12-01 08:15"));
    }

    #[test]
    fn test_conflicting_types_become_mixed() {
        let rows = vec![
            record([("v", json!(1)), ("s", json!("x"))]),
            record([("v", json!("one")), ("s", json!("y"))]),
        ];
        let schema = infer_schema(&rows);
        assert_eq!(schema.column("v").unwrap().dtype, ColumnType::Mixed);
        assert!(schema.column("v").unwrap().nullable);
        assert_eq!(schema.column("s").unwrap().dtype, ColumnType::String);
    }

    #[test]
    fn test_null_mixed_with_values_is_mixed() {
        let rows = vec![record([("v", json!(1))]), record([("v", json!(null))])];
        assert_eq!(infer_schema(&rows).columns[0].dtype, ColumnType::Mixed);
    }

    #[test]
    fn test_columns_absent_from_first_row_not_discovered() {
        let rows = vec![
            record([("a", json!(1))]),
            record([("a", json!(2)), ("b", json!(3))]),
        ];
        assert_eq!(infer_schema(&rows).column_names(), vec!["a"]);
    }

    #[test]
    fn test_sampled_inference_ignores_tail() {
        let rows = vec![record([("a", json!(1))]), record([("a", json!("x"))])];
        let schema = infer_schema_sampled(&rows, 1);
        assert_eq!(schema.columns[0].dtype, ColumnType::Integer);
        assert_eq!(infer_schema_sampled(&rows, 0).columns[0].dtype, ColumnType::Mixed);
    }

    #[test]
    fn test_with_override() {
        let schema = infer_schema(&[record([("a", json!(1))])])
            .with_override("a", ColumnType::Float, false)
            .with_override("b", ColumnType::String, true);
        assert_eq!(schema.column("a").unwrap().dtype, ColumnType::Float);
        assert!(!schema.column("a").unwrap().nullable);
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn test_column_stats() {
        let rows = vec![
            record([("x", json!(4))]),
            record([("x", json!(null))]),
            record([("x", json!(2))]),
            record([("x", json!(4))]),
        ];
        let stats = column_stats(&rows, "x");
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.distinct_count, 2);
        assert_eq!(stats.min, Some(json!(2)));
        assert_eq!(stats.max, Some(json!(4)));
        assert!((stats.mean.unwrap() - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_column_type_serde() {
        let json = serde_json::to_string(&ColumnDescriptor::new("a", ColumnType::Date, true)).unwrap();
        assert!(json.contains("\"type\":\"date\""));
    }
}
