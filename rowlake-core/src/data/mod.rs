//! Record and schema model: rows, datasets, inference, validation.

pub mod dataset;
pub mod record;
pub mod schema;
pub mod validate;

pub use dataset::{Dataset, DatasetKind, DatasetSummary, PersistedDataset};
pub use record::{Record, record};
pub use schema::{ColumnDescriptor, ColumnStats, ColumnType, Schema, column_stats, infer_schema};
pub use validate::{ValidationError, ValidationErrorKind, ValidationReport, validate};
