//! The dataset instance: identity, schema, rows, metadata, version.

use crate::data::record::{Record, estimate_record_size};
use crate::data::schema::Schema;
use crate::error::LakeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// How a dataset came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    RawImport,
    Transformed,
    Merged,
    Clone,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DatasetKind::RawImport => "raw-import",
            DatasetKind::Transformed => "transformed",
            DatasetKind::Merged => "merged",
            DatasetKind::Clone => "clone",
        })
    }
}

/// One named, versioned collection of rows plus schema and metadata.
///
/// Row count is always `rows.len()`; there is no separately stored count
/// that could drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub kind: DatasetKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    pub schema: Schema,
    pub rows: Vec<Record>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl Dataset {
    /// Build a fresh version-1 dataset with a new identity.
    pub fn new(name: impl Into<String>, kind: DatasetKind, schema: Schema, rows: Vec<Record>) -> Self {
        let now = Utc::now();
        Self {
            id: new_dataset_id(),
            name: name.into(),
            kind,
            created_at: now,
            updated_at: now,
            version: 1,
            schema,
            rows,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    /// Approximate in-memory size of the row payload.
    pub fn estimated_size(&self) -> usize {
        self.rows.iter().map(estimate_record_size).sum()
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            version: self.version,
            row_count: self.row_count(),
            column_count: self.schema.len(),
            updated_at: self.updated_at,
        }
    }

    /// Durable form of this dataset, stamped with the write time.
    pub fn to_persisted(&self) -> PersistedDataset {
        PersistedDataset {
            checksum: rows_checksum(&self.rows),
            dataset: self.clone(),
            saved_at: Utc::now(),
        }
    }

    /// Restore a dataset from its durable form, verifying the row checksum
    /// when one was recorded.
    pub fn from_persisted(persisted: PersistedDataset) -> Result<Self, LakeError> {
        if let Some(expected) = &persisted.checksum {
            let actual = rows_checksum(&persisted.dataset.rows);
            if actual.as_deref() != Some(expected.as_str()) {
                tracing::warn!(id = %persisted.dataset.id, "Checksum mismatch on stored dataset");
                return Err(LakeError::storage(format!(
                    "checksum mismatch for dataset {}",
                    persisted.dataset.id
                )));
            }
        }
        Ok(persisted.dataset)
    }
}

/// The persisted shape: every dataset field plus `savedAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDataset {
    #[serde(flatten)]
    pub dataset: Dataset,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A list/stat snapshot for the presentation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: String,
    pub name: String,
    pub kind: DatasetKind,
    pub version: u64,
    pub row_count: usize,
    pub column_count: usize,
    pub updated_at: DateTime<Utc>,
}

pub fn new_dataset_id() -> String {
    format!("ds-{}", uuid::Uuid::new_v4())
}

/// SHA-256 of the serialized rows.
fn rows_checksum(rows: &[Record]) -> Option<String> {
    let bytes = serde_json::to_vec(rows).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}
