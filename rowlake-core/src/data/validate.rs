//! Row validation against a declared schema.
//!
//! Validation never fails: every problem becomes an entry in the report,
//! even when every row mismatches.

use crate::data::record::Record;
use crate::data::schema::{ColumnType, Schema, infer_value_type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a cell failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    RequiredValueIsNull,
    TypeMismatch,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationErrorKind::RequiredValueIsNull => "required value is null",
            ValidationErrorKind::TypeMismatch => "type mismatch",
        })
    }
}

/// A single schema mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub row: usize,
    pub column: String,
    pub error: ValidationErrorKind,
    pub expected: ColumnType,
    pub actual: ColumnType,
}

/// The full outcome of validating rows against a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub total_rows: usize,
    /// Fraction of rows with at least one error (0.0-1.0).
    pub error_rate: f64,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Short, human-readable one-liner.
    pub fn headline(&self) -> String {
        if self.valid {
            format!("{} rows valid", self.total_rows)
        } else {
            format!(
                "{} errors across {} rows ({:.1}% of rows affected)",
                self.errors.len(),
                self.total_rows,
                self.error_rate * 100.0
            )
        }
    }
}

/// Whether a cell of type `actual` is acceptable for a column declared `declared`.
pub fn is_compatible(declared: ColumnType, actual: ColumnType) -> bool {
    declared == actual
        || declared == ColumnType::Mixed
        || (actual == ColumnType::Null && declared != ColumnType::String)
}

/// Validate `rows` against `schema`, accumulating every mismatch.
///
/// Keys absent from the schema are ignored; declared keys absent from a
/// row are treated as null.
pub fn validate(schema: &Schema, rows: &[Record]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut bad_rows = 0usize;

    for (row_idx, row) in rows.iter().enumerate() {
        let before = errors.len();
        for col in &schema.columns {
            let actual = infer_value_type(row.get(&col.name));
            if actual == ColumnType::Null && !col.nullable {
                errors.push(ValidationError {
                    row: row_idx,
                    column: col.name.clone(),
                    error: ValidationErrorKind::RequiredValueIsNull,
                    expected: col.dtype,
                    actual,
                });
            } else if !is_compatible(col.dtype, actual) {
                errors.push(ValidationError {
                    row: row_idx,
                    column: col.name.clone(),
                    error: ValidationErrorKind::TypeMismatch,
                    expected: col.dtype,
                    actual,
                });
            }
        }
        if errors.len() > before {
            bad_rows += 1;
        }
    }

    let total_rows = rows.len();
    let error_rate = if total_rows > 0 {
        bad_rows as f64 / total_rows as f64
    } else {
        0.0
    };

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        total_rows,
        error_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::record;
    use crate::data::schema::{ColumnDescriptor, infer_schema};
    use serde_json::json;

    #[test]
    fn test_validate_clean_data() {
        let rows = vec![
            record([("name", json!("Alice")), ("age", json!(30))]),
            record([("name", json!("Bob")), ("age", json!(25))]),
        ];
        let report = validate(&infer_schema(&rows), &rows);
        assert!(report.valid);
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.error_rate, 0.0);
    }

    #[test]
    fn test_required_null() {
        let schema = Schema::new(vec![ColumnDescriptor::new("id", ColumnType::Integer, false)]);
        let rows = vec![record([("id", json!(1))]), record([("other", json!(1))])];
        let report = validate(&schema, &rows);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 1);
        assert_eq!(report.errors[0].error, ValidationErrorKind::RequiredValueIsNull);
        assert_eq!(report.error_rate, 0.5);
    }

    #[test]
    fn test_type_mismatch() {
        let schema = Schema::new(vec![ColumnDescriptor::new("age", ColumnType::Integer, true)]);
        let rows = vec![record([("age", json!("old"))])];
        let report = validate(&schema, &rows);
        assert_eq!(report.errors[0].error, ValidationErrorKind::TypeMismatch);
        assert_eq!(report.errors[0].actual, ColumnType::String);
    }

    #[test]
    fn test_null_on_nullable_string_column_mismatches() {
        let schema = Schema::new(vec![ColumnDescriptor::new("s", ColumnType::String, true)]);
        let report = validate(&schema, &[record([("s", json!(null))])]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].error, ValidationErrorKind::TypeMismatch);

        let schema = Schema::new(vec![ColumnDescriptor::new("n", ColumnType::Float, true)]);
        assert!(validate(&schema, &[record([("n", json!(null))])]).valid);
    }

    #[test]
    fn test_mixed_accepts_anything() {
        let schema = Schema::new(vec![ColumnDescriptor::new("m", ColumnType::Mixed, true)]);
        let rows = vec![record([("m", json!(1))]), record([("m", json!("x"))])];
        assert!(validate(&schema, &rows).valid);
    }

    #[test]
    fn test_total_mismatch_still_reports() {
        let schema = Schema::new(vec![
            ColumnDescriptor::new("a", ColumnType::Boolean, false),
            ColumnDescriptor::new("b", ColumnType::Date, false),
        ]);
        let rows = vec![record([("a", json!(1)), ("b", json!("x"))]); 3];
        let report = validate(&schema, &rows);
        assert_eq!(report.errors.len(), 6);
        assert_eq!(report.error_rate, 1.0);
        assert!(report.headline().contains("6 errors"));
    }
}
