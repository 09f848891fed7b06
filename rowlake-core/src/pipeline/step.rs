//! Tagged transformation steps.

use crate::data::record::{Record, compare_values, record_key, stringify_value};
use crate::error::LakeError;
use crate::pipeline::aggregate::{Aggregation, aggregate_rows};
use crate::pipeline::condition::Condition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// User predicate for `filter`. Must be pure.
pub type RowPredicate = Arc<dyn Fn(&Record) -> anyhow::Result<bool> + Send + Sync>;
/// User row function for `map`.
pub type RowMapper = Arc<dyn Fn(&Record) -> anyhow::Result<Record> + Send + Sync>;
/// User whole-sequence function for `custom`.
pub type RowsTransform = Arc<dyn Fn(Vec<Record>) -> anyhow::Result<Vec<Record>> + Send + Sync>;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A transformation step.
#[derive(Clone)]
pub enum Step {
    Filter(RowPredicate),
    FilterWhere(Condition),
    Map(RowMapper),
    Select(Vec<String>),
    Exclude(Vec<String>),
    Rename(Vec<(String, String)>),
    Sort {
        field: String,
        direction: SortDirection,
    },
    Distinct {
        field: Option<String>,
    },
    Limit {
        count: usize,
        offset: usize,
    },
    Aggregate {
        aggregations: Vec<Aggregation>,
        group_by: Vec<String>,
    },
    Custom {
        name: String,
        func: RowsTransform,
    },
}

impl Step {
    /// Short tag of this step, used in error messages and lineage metadata.
    pub fn name(&self) -> &str {
        match self {
            Step::Filter(_) | Step::FilterWhere(_) => "filter",
            Step::Map(_) => "map",
            Step::Select(_) => "select",
            Step::Exclude(_) => "exclude",
            Step::Rename(_) => "rename",
            Step::Sort { .. } => "sort",
            Step::Distinct { .. } => "distinct",
            Step::Limit { .. } => "limit",
            Step::Aggregate { .. } => "aggregate",
            Step::Custom { name, .. } => name,
        }
    }

    /// Human-readable description, e.g. `limit(3, offset=2)`.
    pub fn label(&self) -> String {
        match self {
            Step::Filter(_) => "filter(<fn>)".to_string(),
            Step::FilterWhere(cond) => format!("filter({cond})"),
            Step::Map(_) => "map(<fn>)".to_string(),
            Step::Select(fields) => format!("select({})", fields.join(", ")),
            Step::Exclude(fields) => format!("exclude({})", fields.join(", ")),
            Step::Rename(pairs) => {
                let pairs: Vec<String> = pairs.iter().map(|(f, t)| format!("{f}->{t}")).collect();
                format!("rename({})", pairs.join(", "))
            }
            Step::Sort { field, direction } => match direction {
                SortDirection::Ascending => format!("sort({field})"),
                SortDirection::Descending => format!("sort({field}, desc)"),
            },
            Step::Distinct { field: Some(f) } => format!("distinct({f})"),
            Step::Distinct { field: None } => "distinct()".to_string(),
            Step::Limit { count, offset } => format!("limit({count}, offset={offset})"),
            Step::Aggregate {
                aggregations,
                group_by,
            } => {
                let aggs: Vec<String> = aggregations.iter().map(ToString::to_string).collect();
                if group_by.is_empty() {
                    format!("aggregate({})", aggs.join(", "))
                } else {
                    format!("aggregate({}; by {})", aggs.join(", "), group_by.join(", "))
                }
            }
            Step::Custom { name, .. } => format!("custom({name})"),
        }
    }

    /// Apply this step to a materialized row sequence.
    pub fn apply(&self, rows: Vec<Record>) -> Result<Vec<Record>, LakeError> {
        let fail = |e: anyhow::Error| LakeError::transform(self.name(), format!("{e:#}"));

        match self {
            Step::Filter(pred) => {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    if pred(&row).map_err(fail)? {
                        kept.push(row);
                    }
                }
                Ok(kept)
            }
            Step::FilterWhere(cond) => Ok(rows.into_iter().filter(|r| cond.matches(r)).collect()),
            Step::Map(f) => rows.iter().map(|r| f(r).map_err(fail)).collect(),
            Step::Select(fields) => Ok(rows
                .into_iter()
                .map(|mut row| {
                    let mut out = Record::new();
                    for field in fields {
                        if let Some(v) = row.remove(field) {
                            out.insert(field.clone(), v);
                        }
                    }
                    out
                })
                .collect()),
            Step::Exclude(fields) => {
                let drop: HashSet<&str> = fields.iter().map(String::as_str).collect();
                Ok(rows
                    .into_iter()
                    .map(|row| row.into_iter().filter(|(k, _)| !drop.contains(k.as_str())).collect())
                    .collect())
            }
            Step::Rename(pairs) => Ok(rows
                .into_iter()
                .map(|row| {
                    pairs
                        .iter()
                        .fold(row, |row, (from, to)| rename_field(row, from, to))
                })
                .collect()),
            Step::Sort { field, direction } => {
                let mut rows = rows;
                // `sort_by` is stable, so ties keep their input order.
                rows.sort_by(|a, b| {
                    let ord = compare_values(
                        a.get(field).unwrap_or(&Value::Null),
                        b.get(field).unwrap_or(&Value::Null),
                    );
                    match direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    }
                });
                Ok(rows)
            }
            Step::Distinct { field } => {
                let mut seen = HashSet::new();
                Ok(rows
                    .into_iter()
                    .filter(|row| {
                        let key = match field {
                            Some(f) => stringify_value(row.get(f).unwrap_or(&Value::Null)),
                            None => record_key(row),
                        };
                        seen.insert(key)
                    })
                    .collect())
            }
            Step::Limit { count, offset } => Ok(rows.into_iter().skip(*offset).take(*count).collect()),
            Step::Aggregate {
                aggregations,
                group_by,
            } => Ok(aggregate_rows(&rows, aggregations, group_by)),
            Step::Custom { func, .. } => func(rows).map_err(fail),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Move `from` to `to` in place. An existing `to` field is overwritten by
/// the moved value.
fn rename_field(row: Record, from: &str, to: &str) -> Record {
    if from == to || !row.contains_key(from) {
        return row;
    }
    row.into_iter()
        .filter(|(k, _)| k != to)
        .map(|(k, v)| if k == from { (to.to_string(), v) } else { (k, v) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::record;
    use crate::pipeline::condition::ConditionOp;
    use serde_json::json;

    fn people() -> Vec<Record> {
        vec![
            record([("name", json!("Alice")), ("age", json!(25)), ("city", json!("Oslo"))]),
            record([("name", json!("Bob")), ("age", json!(30)), ("city", json!("Rome"))]),
            record([("name", json!("Cara")), ("age", json!(25)), ("city", json!("Oslo"))]),
        ]
    }

    #[test]
    fn test_select_orders_fields() {
        let out = Step::Select(vec!["city".into(), "name".into()]).apply(people()).unwrap();
        let keys: Vec<&String> = out[0].keys().collect();
        assert_eq!(keys, vec!["city", "name"]);
    }

    #[test]
    fn test_exclude() {
        let out = Step::Exclude(vec!["age".into()]).apply(people()).unwrap();
        assert!(out.iter().all(|r| !r.contains_key("age") && r.contains_key("name")));
    }

    #[test]
    fn test_rename_keeps_position_and_passthrough() {
        let out = Step::Rename(vec![("name".into(), "who".into())]).apply(people()).unwrap();
        let keys: Vec<&String> = out[0].keys().collect();
        assert_eq!(keys, vec!["who", "age", "city"]);
        assert_eq!(out[1]["who"], json!("Bob"));
    }

    #[test]
    fn test_rename_onto_existing_field_takes_moved_value() {
        let rows = vec![record([("a", json!(1)), ("b", json!(2))])];
        let out = Step::Rename(vec![("a".into(), "b".into())]).apply(rows).unwrap();
        assert_eq!(out, vec![record([("b", json!(1))])]);
    }

    #[test]
    fn test_rename_missing_source_leaves_row_untouched() {
        let rows = vec![record([("b", json!(2))])];
        let out = Step::Rename(vec![("a".into(), "b".into())]).apply(rows.clone()).unwrap();
        assert_eq!(out, rows);
    }

    #[test]
    fn test_sort_is_stable() {
        let out = Step::Sort {
            field: "age".into(),
            direction: SortDirection::Ascending,
        }
        .apply(people())
        .unwrap();
        let names: Vec<&Value> = out.iter().map(|r| &r["name"]).collect();
        assert_eq!(names, vec![&json!("Alice"), &json!("Cara"), &json!("Bob")]);

        let out = Step::Sort {
            field: "age".into(),
            direction: SortDirection::Descending,
        }
        .apply(people())
        .unwrap();
        assert_eq!(out[0]["name"], json!("Bob"));
        assert_eq!(out[1]["name"], json!("Alice"));
    }

    #[test]
    fn test_distinct_by_field_keeps_first() {
        let out = Step::Distinct {
            field: Some("city".into()),
        }
        .apply(people())
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["name"], json!("Alice"));
    }

    #[test]
    fn test_distinct_structural() {
        let rows = vec![
            record([("a", json!(1)), ("b", json!(2))]),
            record([("b", json!(2)), ("a", json!(1))]),
            record([("a", json!(1)), ("b", json!(3))]),
        ];
        let out = Step::Distinct { field: None }.apply(rows).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_limit_offset() {
        let rows: Vec<Record> = (0..10).map(|i| record([("i", json!(i))])).collect();
        let out = Step::Limit { count: 3, offset: 2 }.apply(rows).unwrap();
        let idx: Vec<i64> = out.iter().map(|r| r["i"].as_i64().unwrap()).collect();
        assert_eq!(idx, vec![2, 3, 4]);
    }

    #[test]
    fn test_filter_error_names_step() {
        let step = Step::Filter(Arc::new(|_: &Record| -> anyhow::Result<bool> {
            anyhow::bail!("bad predicate")
        }));
        let err = step.apply(people()).unwrap_err();
        match err {
            LakeError::Transform { step, message } => {
                assert_eq!(step, "filter");
                assert!(message.contains("bad predicate"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_filter_where() {
        let step = Step::FilterWhere(Condition::new("age", ConditionOp::Gt, json!(26)));
        assert_eq!(step.apply(people()).unwrap().len(), 1);
        assert_eq!(step.label(), "filter(age>26)");
    }
}
