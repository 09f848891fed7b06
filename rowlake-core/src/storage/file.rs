//! Directory-backed storage: one pretty JSON file per dataset.

use crate::data::dataset::PersistedDataset;
use crate::error::LakeError;
use crate::storage::{Storage, StoredEntry};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, LakeError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(LakeError::invalid_input(format!("Invalid dataset id: '{id}'")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Write the dataset to `<id>.json.tmp`, sync it, then rename it over
    /// `<id>.json`. Readers never observe a partially written file.
    fn write_sync(path: &Path, dataset: &PersistedDataset) -> Result<(), LakeError> {
        let fail = |e: &dyn std::fmt::Display| {
            LakeError::storage(format!("failed to write {}: {e}", path.display()))
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fail(&e))?;
        }
        let json = serde_json::to_vec_pretty(dataset).map_err(|e| fail(&e))?;
        let tmp = path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp).map_err(|e| fail(&e))?;
        file.write_all(&json).map_err(|e| fail(&e))?;
        file.sync_all().map_err(|e| fail(&e))?;
        drop(file);
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            fail(&e)
        })
    }

    /// `Ok(None)` when no file exists for the dataset.
    fn read_sync(path: &Path) -> Result<Option<PersistedDataset>, LakeError> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LakeError::storage(format!("failed to read {}: {e}", path.display())));
            }
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| LakeError::storage(format!("failed to read {}: {e}", path.display())))
    }

    fn read_dir_sync(dir: &Path) -> Result<Vec<PersistedDataset>, LakeError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(ds) = Self::read_sync(&path)? {
                out.push(ds);
            }
        }
        out.sort_by(|a, b| a.dataset.id.cmp(&b.dataset.id));
        Ok(out)
    }
}

/// Run blocking filesystem work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, LakeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, LakeError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LakeError::storage(format!("storage task join error: {e}")))?
}

#[async_trait]
impl Storage for FileStorage {
    async fn save(&self, id: &str, dataset: &PersistedDataset) -> Result<String, LakeError> {
        let path = self.path_for(id)?;
        let dataset = dataset.clone();
        let id = id.to_string();
        blocking(move || {
            Self::write_sync(&path, &dataset)?;
            tracing::debug!(path = %path.display(), "Saved dataset file");
            Ok(id)
        })
        .await
    }

    async fn load(&self, id: &str) -> Result<Option<PersistedDataset>, LakeError> {
        let path = self.path_for(id)?;
        blocking(move || Self::read_sync(&path)).await
    }

    async fn delete(&self, id: &str) -> Result<bool, LakeError> {
        let path = self.path_for(id)?;
        blocking(move || {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(LakeError::storage(format!(
                        "failed to delete {}: {e}",
                        path.display()
                    )));
                }
            }
            Ok(true)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<StoredEntry>, LakeError> {
        let all = self.load_all().await?;
        Ok(all.iter().map(StoredEntry::from).collect())
    }

    async fn load_all(&self) -> Result<Vec<PersistedDataset>, LakeError> {
        let dir = self.dir.clone();
        blocking(move || Self::read_dir_sync(&dir)).await
    }
}
