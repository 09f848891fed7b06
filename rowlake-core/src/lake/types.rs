//! Option, patch and snapshot types for [`Lake`](super::Lake) operations.

use crate::data::dataset::{Dataset, DatasetKind};
use crate::data::record::Record;
use crate::data::schema::Schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What `create` wraps into a dataset.
#[derive(Debug, Clone)]
pub enum DatasetInput {
    Rows(Vec<Record>),
    /// A prebuilt dataset, e.g. a pipeline result. Its schema, kind and
    /// metadata are kept; identity and version are reassigned.
    Dataset(Dataset),
}

impl From<Vec<Record>> for DatasetInput {
    fn from(rows: Vec<Record>) -> Self {
        Self::Rows(rows)
    }
}

impl From<Dataset> for DatasetInput {
    fn from(dataset: Dataset) -> Self {
        Self::Dataset(dataset)
    }
}

#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// Use this schema instead of inferring one.
    pub schema: Option<Schema>,
    /// Defaults to `raw-import` for rows, or the dataset's own kind.
    pub kind: Option<DatasetKind>,
    pub metadata: serde_json::Map<String, Value>,
    pub persist: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            schema: None,
            kind: None,
            metadata: serde_json::Map::new(),
            persist: true,
        }
    }
}

impl CreateOptions {
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Fields to replace on `update`. Unset fields keep their current value;
/// metadata keys are merged over the existing map.
#[derive(Debug, Clone, Default)]
pub struct DatasetPatch {
    pub name: Option<String>,
    pub rows: Option<Vec<Record>>,
    pub schema: Option<Schema>,
    pub metadata: serde_json::Map<String, Value>,
}

impl DatasetPatch {
    pub fn rows(rows: Vec<Record>) -> Self {
        Self {
            rows: Some(rows),
            ..Self::default()
        }
    }

    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Re-infer the schema when rows change and no schema is given.
    pub reinfer_schema: bool,
    pub persist: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            reinfer_schema: true,
            persist: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub name: Option<String>,
    pub persist: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            name: None,
            persist: true,
        }
    }
}

/// Per-id lifecycle bookkeeping kept beside the dataset map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEntry {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    /// Last successful write to the storage collaborator.
    pub persisted_at: Option<DateTime<Utc>>,
}

impl LifecycleEntry {
    pub(crate) fn for_dataset(dataset: &Dataset, persisted_at: Option<DateTime<Utc>>) -> Self {
        Self {
            created_at: dataset.created_at,
            updated_at: dataset.updated_at,
            version: dataset.version,
            persisted_at,
        }
    }
}

/// Registry-wide counters for the presentation boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LakeStats {
    pub dataset_count: usize,
    pub total_rows: usize,
    pub approx_bytes: usize,
    pub by_kind: BTreeMap<DatasetKind, usize>,
}
