//! In-process storage backend, used by tests and ephemeral lakes.

use crate::data::dataset::PersistedDataset;
use crate::error::LakeError;
use crate::storage::{Storage, StoredEntry};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, PersistedDataset>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, PersistedDataset>>, LakeError> {
        self.entries
            .lock()
            .map_err(|_| LakeError::storage("memory storage lock poisoned"))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, id: &str, dataset: &PersistedDataset) -> Result<String, LakeError> {
        self.lock()?.insert(id.to_string(), dataset.clone());
        Ok(id.to_string())
    }

    async fn load(&self, id: &str) -> Result<Option<PersistedDataset>, LakeError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, LakeError> {
        self.lock()?.remove(id);
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<StoredEntry>, LakeError> {
        Ok(self.lock()?.values().map(StoredEntry::from).collect())
    }

    async fn load_all(&self) -> Result<Vec<PersistedDataset>, LakeError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}
