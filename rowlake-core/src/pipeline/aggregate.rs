//! Aggregation functions and grouped aggregation.

use crate::data::record::{Record, as_number, compare_values, number_value, stringify_value};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Aggregation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AggregateOp::Count => "COUNT",
            AggregateOp::CountDistinct => "COUNT_DISTINCT",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::First => "FIRST",
            AggregateOp::Last => "LAST",
        })
    }
}

/// One named output column of an aggregate step, e.g. `total = SUM(amount)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub name: String,
    pub op: AggregateOp,
    /// `None` is only meaningful for `Count`, which then counts rows.
    #[serde(default)]
    pub field: Option<String>,
}

impl Aggregation {
    pub fn new(name: impl Into<String>, op: AggregateOp, field: Option<&str>) -> Self {
        Self {
            name: name.into(),
            op,
            field: field.map(str::to_string),
        }
    }

    pub fn count(name: impl Into<String>) -> Self {
        Self::new(name, AggregateOp::Count, None)
    }

    pub fn sum(name: impl Into<String>, field: &str) -> Self {
        Self::new(name, AggregateOp::Sum, Some(field))
    }

    pub fn avg(name: impl Into<String>, field: &str) -> Self {
        Self::new(name, AggregateOp::Avg, Some(field))
    }

    pub fn min(name: impl Into<String>, field: &str) -> Self {
        Self::new(name, AggregateOp::Min, Some(field))
    }

    pub fn max(name: impl Into<String>, field: &str) -> Self {
        Self::new(name, AggregateOp::Max, Some(field))
    }

    /// Compute this aggregation over a group of rows.
    pub fn compute(&self, rows: &[&Record]) -> Value {
        let cells = || {
            rows.iter().filter_map(|row| match &self.field {
                Some(field) => row.get(field),
                None => None,
            })
        };
        let numbers = || cells().filter_map(as_number);

        match self.op {
            AggregateOp::Count => match &self.field {
                None => Value::from(rows.len()),
                Some(_) => Value::from(cells().filter(|v| !v.is_null()).count()),
            },
            AggregateOp::CountDistinct => {
                let distinct: HashSet<String> = cells()
                    .filter(|v| !v.is_null())
                    .map(stringify_value)
                    .collect();
                Value::from(distinct.len())
            }
            AggregateOp::Sum => number_value(numbers().sum()),
            AggregateOp::Avg => {
                let (sum, count) = numbers().fold((0.0, 0usize), |(s, c), n| (s + n, c + 1));
                if count == 0 {
                    Value::Null
                } else {
                    number_value(sum / count as f64)
                }
            }
            AggregateOp::Min => cells()
                .filter(|v| !v.is_null())
                .min_by(|a, b| compare_values(a, b))
                .cloned()
                .unwrap_or(Value::Null),
            AggregateOp::Max => cells()
                .filter(|v| !v.is_null())
                .max_by(|a, b| compare_values(a, b))
                .cloned()
                .unwrap_or(Value::Null),
            AggregateOp::First => cells().next().cloned().unwrap_or(Value::Null),
            AggregateOp::Last => cells().last().cloned().unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}({})",
            self.name,
            self.op,
            self.field.as_deref().unwrap_or("*")
        )
    }
}

/// Aggregate rows, optionally partitioned by `group_by`.
///
/// Without grouping the result is exactly one row. With grouping, one row
/// per distinct tuple of group values, in first-seen order, carrying the
/// group values followed by each aggregation.
pub fn aggregate_rows(rows: &[Record], aggregations: &[Aggregation], group_by: &[String]) -> Vec<Record> {
    if group_by.is_empty() {
        let all: Vec<&Record> = rows.iter().collect();
        let mut out = Record::new();
        for agg in aggregations {
            out.insert(agg.name.clone(), agg.compute(&all));
        }
        return vec![out];
    }

    let mut order: Vec<Vec<String>> = Vec::new();
    let mut groups: HashMap<Vec<String>, Vec<&Record>> = HashMap::new();
    for row in rows {
        let key: Vec<String> = group_by
            .iter()
            .map(|g| stringify_value(row.get(g).unwrap_or(&Value::Null)))
            .collect();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    order
        .iter()
        .filter_map(|key| groups.get(key))
        .map(|members| {
            let mut out = Record::new();
            for g in group_by {
                let value = members
                    .first()
                    .and_then(|row| row.get(g))
                    .cloned()
                    .unwrap_or(Value::Null);
                out.insert(g.clone(), value);
            }
            for agg in aggregations {
                out.insert(agg.name.clone(), agg.compute(members));
            }
            out
        })
        .collect()
}
