//! Declarative, serializable row predicates.

use crate::data::record::{Record, compare_values, stringify_value};
use crate::error::LakeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    IsNull,
    NotNull,
}

impl ConditionOp {
    fn symbol(self) -> &'static str {
        match self {
            ConditionOp::Eq => "=",
            ConditionOp::Ne => "!=",
            ConditionOp::Gt => ">",
            ConditionOp::Gte => ">=",
            ConditionOp::Lt => "<",
            ConditionOp::Lte => "<=",
            ConditionOp::Contains => "~",
            ConditionOp::IsNull => "IS NULL",
            ConditionOp::NotNull => "IS NOT NULL",
        }
    }
}

/// `field op value`, evaluated against one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: ConditionOp,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: ConditionOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn matches(&self, row: &Record) -> bool {
        let cell = row.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            ConditionOp::IsNull => cell.is_null(),
            ConditionOp::NotNull => !cell.is_null(),
            ConditionOp::Eq => compare_values(cell, &self.value) == Ordering::Equal,
            ConditionOp::Ne => compare_values(cell, &self.value) != Ordering::Equal,
            ConditionOp::Gt => ordered(cell, &self.value).is_some_and(Ordering::is_gt),
            ConditionOp::Gte => ordered(cell, &self.value).is_some_and(Ordering::is_ge),
            ConditionOp::Lt => ordered(cell, &self.value).is_some_and(Ordering::is_lt),
            ConditionOp::Lte => ordered(cell, &self.value).is_some_and(Ordering::is_le),
            ConditionOp::Contains => match cell {
                Value::String(s) => s.contains(&stringify_value(&self.value)),
                Value::Array(items) => items
                    .iter()
                    .any(|item| compare_values(item, &self.value) == Ordering::Equal),
                _ => false,
            },
        }
    }
}

/// Ordered comparisons only hold between two numbers or two strings.
fn ordered(cell: &Value, target: &Value) -> Option<Ordering> {
    match (cell, target) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            Some(compare_values(cell, target))
        }
        _ => None,
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            ConditionOp::IsNull | ConditionOp::NotNull => {
                write!(f, "{} {}", self.field, self.op.symbol())
            }
            op => write!(f, "{}{}{}", self.field, op.symbol(), self.value),
        }
    }
}

/// Parse a literal: JSON scalars when they parse, otherwise a raw string.
fn parse_literal(raw: &str) -> Value {
    let raw = raw.trim();
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null | Value::String(_))) => v,
        _ => Value::String(raw.trim_matches('\'').to_string()),
    }
}

impl FromStr for Condition {
    type Err = LakeError;

    /// Accepts `age>26`, `name=Bob`, `score<=1.5`, `tag~rust`,
    /// `email IS NULL`, `email IS NOT NULL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let upper = text.to_ascii_uppercase();
        if let Some(field) = upper.strip_suffix(" IS NOT NULL").map(|f| &text[..f.len()]) {
            return Ok(Self::new(field.trim(), ConditionOp::NotNull, Value::Null));
        }
        if let Some(field) = upper.strip_suffix(" IS NULL").map(|f| &text[..f.len()]) {
            return Ok(Self::new(field.trim(), ConditionOp::IsNull, Value::Null));
        }

        // Two-character operators first so `>=` never parses as `>`.
        const OPERATORS: &[(&str, ConditionOp)] = &[
            (">=", ConditionOp::Gte),
            ("<=", ConditionOp::Lte),
            ("!=", ConditionOp::Ne),
            ("==", ConditionOp::Eq),
            (">", ConditionOp::Gt),
            ("<", ConditionOp::Lt),
            ("=", ConditionOp::Eq),
            ("~", ConditionOp::Contains),
        ];
        for (symbol, op) in OPERATORS {
            if let Some((field, value)) = text.split_once(symbol) {
                let field = field.trim();
                if field.is_empty() {
                    break;
                }
                return Ok(Self::new(field, *op, parse_literal(value)));
            }
        }
        Err(LakeError::invalid_input(format!("Cannot parse condition: '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::record;
    use serde_json::json;

    #[test]
    fn test_parse_operators() {
        let c: Condition = "age>26".parse().unwrap();
        assert_eq!(c, Condition::new("age", ConditionOp::Gt, json!(26)));
        let c: Condition = "age >= 26".parse().unwrap();
        assert_eq!(c.op, ConditionOp::Gte);
        let c: Condition = "name=Bob".parse().unwrap();
        assert_eq!(c.value, json!("Bob"));
        let c: Condition = "flag == true".parse().unwrap();
        assert_eq!(c.value, json!(true));
        let c: Condition = "email is not null".parse().unwrap();
        assert_eq!(c, Condition::new("email", ConditionOp::NotNull, Value::Null));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("no operator here".parse::<Condition>().is_err());
        assert!(">5".parse::<Condition>().is_err());
    }

    #[test]
    fn test_matches() {
        let row = record([
            ("age", json!(30)),
            ("name", json!("Bob")),
            ("tags", json!(["a", "b"])),
        ]);
        assert!(Condition::new("age", ConditionOp::Gt, json!(26)).matches(&row));
        assert!(Condition::new("age", ConditionOp::Eq, json!(30.0)).matches(&row));
        assert!(!Condition::new("age", ConditionOp::Lt, json!("40")).matches(&row));
        assert!(Condition::new("name", ConditionOp::Contains, json!("ob")).matches(&row));
        assert!(Condition::new("tags", ConditionOp::Contains, json!("b")).matches(&row));
        assert!(Condition::new("missing", ConditionOp::IsNull, Value::Null).matches(&row));
        assert!(Condition::new("name", ConditionOp::Ne, json!("Alice")).matches(&row));
    }

    #[test]
    fn test_display() {
        assert_eq!(Condition::new("age", ConditionOp::Gt, json!(26)).to_string(), "age>26");
        assert_eq!(
            Condition::new("x", ConditionOp::IsNull, Value::Null).to_string(),
            "x IS NULL"
        );
    }
}
