//! The unified row representation and value helpers shared by every layer.
//!
//! A [`Record`] is an insertion-ordered string-keyed map. Rows are free to
//! carry keys the schema does not declare, or to omit declared keys; shape
//! is only checked when validation is requested explicitly.

use serde_json::Value;
use std::cmp::Ordering;

/// One row of a dataset.
pub type Record = serde_json::Map<String, Value>;

/// Build a record from `(key, value)` pairs, keeping their order.
pub fn record<K, I>(pairs: I) -> Record
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Render a value the way group keys and distinct keys see it.
///
/// Strings render raw; everything else renders as compact JSON text.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A key that is equal for structurally equal values regardless of the
/// insertion order of object keys.
pub fn canonical_key(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// [`canonical_key`] for a whole record.
pub fn record_key(row: &Record) -> String {
    let mut out = String::new();
    write_canonical_object(row, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => write_canonical_object(map, out),
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_canonical_object(map: &Record, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(&map[key.as_str()], out);
    }
    out.push('}');
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over values: null < bool < number < string < array < object.
///
/// Numbers compare numerically, strings lexicographically, arrays
/// element-wise. Objects of equal rank compare by canonical key.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => canonical_key(a).cmp(&canonical_key(b)),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Numeric view of a value. Numeric strings are not coerced.
pub fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Wrap an `f64` as a JSON number, emitting an integer when it has no
/// fractional part and fits, and null for non-finite values.
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Rough in-memory footprint of a value in bytes.
pub fn estimate_value_size(value: &Value) -> usize {
    match value {
        Value::Null => 4,
        Value::Bool(_) => 4,
        Value::Number(_) => 8,
        Value::String(s) => s.len() + 2,
        Value::Array(items) => items.iter().map(estimate_value_size).sum::<usize>() + 2,
        Value::Object(map) => estimate_record_size(map),
    }
}

/// Rough in-memory footprint of a record in bytes (keys plus values).
pub fn estimate_record_size(row: &Record) -> usize {
    row.iter()
        .map(|(k, v)| k.len() + estimate_value_size(v))
        .sum::<usize>()
        + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_keeps_insertion_order() {
        let row = record([("b", json!(1)), ("a", json!(2))]);
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_stringify_value() {
        assert_eq!(stringify_value(&json!("N")), "N");
        assert_eq!(stringify_value(&json!(10)), "10");
        assert_eq!(stringify_value(&json!(null)), "null");
        assert_eq!(stringify_value(&json!(true)), "true");
    }

    #[test]
    fn test_canonical_key_ignores_key_order() {
        let a = record([("x", json!(1)), ("y", json!({"p": 1, "q": 2}))]);
        let b = record([("y", json!({"q": 2, "p": 1})), ("x", json!(1))]);
        assert_eq!(record_key(&a), record_key(&b));
    }

    #[test]
    fn test_compare_values_orders_types() {
        assert_eq!(compare_values(&json!(null), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(5), &json!("5")), Ordering::Less);
    }

    #[test]
    fn test_number_value_prefers_integers() {
        assert_eq!(number_value(15.0), json!(15));
        assert_eq!(number_value(2.5), json!(2.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn test_estimate_size_grows_with_content() {
        let small = record([("a", json!(1))]);
        let large = record([("a", json!(1)), ("text", json!("a long string value"))]);
        assert!(estimate_record_size(&large) > estimate_record_size(&small));
    }
}
