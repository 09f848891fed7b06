//! Storage collaborators: an opaque async key-value store for datasets.
//!
//! The lake only ever talks to the [`Storage`] trait; backends are
//! swappable without touching the persisted shape.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::data::dataset::{DatasetKind, PersistedDataset};
use crate::error::LakeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listing entry for a stored dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: String,
    pub name: String,
    pub kind: DatasetKind,
    pub saved_at: DateTime<Utc>,
}

impl From<&PersistedDataset> for StoredEntry {
    fn from(p: &PersistedDataset) -> Self {
        Self {
            id: p.dataset.id.clone(),
            name: p.dataset.name.clone(),
            kind: p.dataset.kind,
            saved_at: p.saved_at,
        }
    }
}

/// Persistent key-value storage for datasets.
///
/// Failures surface as [`LakeError::Storage`] and are never retried by the
/// caller.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save (or overwrite) a dataset under `id`, returning the id.
    async fn save(&self, id: &str, dataset: &PersistedDataset) -> Result<String, LakeError>;

    /// Load one dataset, or `None` if nothing is stored under `id`.
    async fn load(&self, id: &str) -> Result<Option<PersistedDataset>, LakeError>;

    /// Delete a dataset. Returns `true` once nothing remains stored under `id`.
    async fn delete(&self, id: &str) -> Result<bool, LakeError>;

    /// List stored datasets without their rows.
    async fn list(&self) -> Result<Vec<StoredEntry>, LakeError>;

    /// Load every stored dataset.
    async fn load_all(&self) -> Result<Vec<PersistedDataset>, LakeError>;
}
