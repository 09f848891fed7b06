//! The dataset registry ("Lake").
//!
//! A [`Lake`] owns every dataset's identity and lifetime. All mutation goes
//! through it: datasets are rebuilt on update rather than edited in place,
//! and each mutation bumps the version by exactly one. Lakes are plain
//! values; construct as many as needed and pass them around.

pub mod types;

pub use types::{
    CreateOptions, DatasetInput, DatasetPatch, LakeStats, LifecycleEntry, MergeOptions, UpdateOptions,
};

use crate::adapters::{AdapterOptions, AdapterRegistry, ExternalHandle};
use crate::config::{LakeConfig, StorageBackend};
use crate::data::dataset::{Dataset, DatasetKind, DatasetSummary, new_dataset_id};
use crate::data::record::Record;
use crate::data::schema::infer_schema_sampled;
use crate::data::validate::{ValidationReport, validate};
use crate::error::LakeError;
use crate::pipeline::Pipeline;
use crate::sql::{SqlEngine, SqliteEngine};
use crate::storage::{FileStorage, MemoryStorage, Storage};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct Lake {
    datasets: HashMap<String, Arc<Dataset>>,
    lifecycle: HashMap<String, LifecycleEntry>,
    storage: Option<Arc<dyn Storage>>,
    adapters: AdapterRegistry,
    sql: Mutex<Option<Box<dyn SqlEngine>>>,
    config: LakeConfig,
}

impl std::fmt::Debug for Lake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lake")
            .field("datasets", &self.datasets.len())
            .field("has_storage", &self.storage.is_some())
            .field("adapters", &self.adapters)
            .finish_non_exhaustive()
    }
}

impl Default for Lake {
    fn default() -> Self {
        Self::new(LakeConfig::default())
    }
}

impl Lake {
    /// An in-memory lake with no storage collaborator.
    pub fn new(config: LakeConfig) -> Self {
        Self {
            datasets: HashMap::new(),
            lifecycle: HashMap::new(),
            storage: None,
            adapters: AdapterRegistry::with_defaults(),
            sql: Mutex::new(None),
            config,
        }
    }

    /// Build a lake wired to the storage backend named in `config`.
    /// Relative data directories resolve against `workspace`.
    pub fn from_config(config: LakeConfig, workspace: &Path) -> Self {
        let storage: Arc<dyn Storage> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::File => Arc::new(FileStorage::new(config.data_dir(workspace))),
        };
        Self::new(config).with_storage(storage)
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_sql_engine(self, engine: Box<dyn SqlEngine>) -> Self {
        Self {
            sql: Mutex::new(Some(engine)),
            ..self
        }
    }

    pub fn config(&self) -> &LakeConfig {
        &self.config
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<Arc<Dataset>> {
        self.datasets.get(id).cloned()
    }

    fn require(&self, id: &str) -> Result<Arc<Dataset>, LakeError> {
        self.get(id).ok_or_else(|| LakeError::not_found(id))
    }

    /// Most recently updated dataset carrying `name`.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Dataset>> {
        self.datasets
            .values()
            .filter(|d| d.name == name)
            .max_by_key(|d| (d.updated_at, d.version))
            .cloned()
    }

    pub fn lifecycle(&self, id: &str) -> Option<&LifecycleEntry> {
        self.lifecycle.get(id)
    }

    /// Summary snapshots sorted by name, then id.
    pub fn list(&self) -> Vec<DatasetSummary> {
        let mut out: Vec<DatasetSummary> = self.datasets.values().map(|d| d.summary()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Registry-wide counters, computed in a single pass.
    pub fn stats(&self) -> LakeStats {
        self.datasets
            .values()
            .fold(LakeStats::default(), |mut stats, dataset| {
                stats.dataset_count += 1;
                stats.total_rows += dataset.row_count();
                stats.approx_bytes += dataset.estimated_size();
                *stats.by_kind.entry(dataset.kind).or_insert(0) += 1;
                stats
            })
    }

    /// Check a dataset's rows against its own schema.
    pub fn validate(&self, id: &str) -> Result<ValidationReport, LakeError> {
        let dataset = self.require(id)?;
        Ok(validate(&dataset.schema, &dataset.rows))
    }

    /// Bind a new pipeline read-only to a dataset.
    pub fn create_pipeline(&self, source_id: &str) -> Result<Pipeline, LakeError> {
        Ok(Pipeline::new(self.require(source_id)?))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    fn infer(&self, rows: &[Record]) -> crate::data::schema::Schema {
        infer_schema_sampled(rows, self.config.inference.sample_rows)
    }

    /// Write to storage when requested and attached, then publish into both
    /// maps. A storage failure leaves the registry untouched.
    async fn commit(&mut self, dataset: Dataset, persist: bool) -> Result<Arc<Dataset>, LakeError> {
        let mut persisted_at = self.lifecycle.get(&dataset.id).and_then(|l| l.persisted_at);
        if persist {
            if let Some(storage) = &self.storage {
                let persisted = dataset.to_persisted();
                storage.save(&dataset.id, &persisted).await?;
                persisted_at = Some(persisted.saved_at);
            }
        }

        let dataset = Arc::new(dataset);
        self.lifecycle.insert(
            dataset.id.clone(),
            LifecycleEntry::for_dataset(&dataset, persisted_at),
        );
        self.datasets.insert(dataset.id.clone(), Arc::clone(&dataset));
        Ok(dataset)
    }

    /// Wrap rows (or a prebuilt dataset) into a new registered dataset.
    pub async fn create(
        &mut self,
        name: impl Into<String>,
        input: impl Into<DatasetInput>,
        options: CreateOptions,
    ) -> Result<Arc<Dataset>, LakeError> {
        let name = name.into();
        let mut dataset = match input.into() {
            DatasetInput::Rows(rows) => {
                let schema = match options.schema {
                    Some(schema) => schema,
                    None => self.infer(&rows),
                };
                Dataset::new(name, options.kind.unwrap_or(DatasetKind::RawImport), schema, rows)
            }
            DatasetInput::Dataset(source) => {
                let now = Utc::now();
                Dataset {
                    id: new_dataset_id(),
                    name,
                    kind: options.kind.unwrap_or(source.kind),
                    created_at: now,
                    updated_at: now,
                    version: 1,
                    schema: options.schema.unwrap_or(source.schema),
                    rows: source.rows,
                    metadata: source.metadata,
                }
            }
        };
        dataset.metadata.extend(options.metadata);

        let dataset = self.commit(dataset, options.persist).await?;
        tracing::info!(
            id = %dataset.id,
            name = %dataset.name,
            kind = %dataset.kind,
            rows = dataset.row_count(),
            "Dataset created"
        );
        Ok(dataset)
    }

    /// Execute a pipeline and register its result.
    pub async fn materialize(
        &mut self,
        pipeline: &Pipeline,
        name: Option<&str>,
    ) -> Result<Arc<Dataset>, LakeError> {
        let result = pipeline.execute()?;
        let name = name.map(str::to_string).unwrap_or_else(|| result.name.clone());
        self.create(name, result, CreateOptions::default()).await
    }

    /// Produce a new version of a dataset with `patch` applied.
    ///
    /// The held dataset is never edited; a rebuilt copy replaces it with the
    /// version bumped by one and a fresh `updated_at`.
    pub async fn update(
        &mut self,
        id: &str,
        patch: DatasetPatch,
        options: UpdateOptions,
    ) -> Result<Arc<Dataset>, LakeError> {
        let current = self.require(id)?;
        let mut next = (*current).clone();

        if let Some(name) = patch.name {
            next.name = name;
        }
        let rows_changed = patch.rows.is_some();
        if let Some(rows) = patch.rows {
            next.rows = rows;
        }
        match patch.schema {
            Some(schema) => next.schema = schema,
            None if rows_changed && options.reinfer_schema => next.schema = self.infer(&next.rows),
            None => {}
        }
        next.metadata.extend(patch.metadata);
        next.version = current.version + 1;
        next.updated_at = Utc::now().max(current.updated_at);

        let dataset = self.commit(next, options.persist).await?;
        tracing::info!(id = %dataset.id, version = dataset.version, "Dataset updated");
        Ok(dataset)
    }

    /// Remove a dataset from storage and then from the registry.
    ///
    /// Returns `false` without touching storage when the id is unknown. A
    /// storage failure leaves the dataset registered.
    pub async fn delete(&mut self, id: &str) -> Result<bool, LakeError> {
        if !self.datasets.contains_key(id) {
            tracing::debug!(id, "Delete of unknown dataset ignored");
            return Ok(false);
        }

        if let Some(storage) = &self.storage {
            storage.delete(id).await?;
        }
        self.datasets.remove(id);
        self.lifecycle.remove(id);
        tracing::info!(id, "Dataset deleted");
        Ok(true)
    }

    /// Deep-copy a dataset under a new identity.
    pub async fn clone_dataset(&mut self, id: &str, new_name: Option<&str>) -> Result<Arc<Dataset>, LakeError> {
        let source = self.require(id)?;
        let name = new_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (copy)", source.name));

        let mut dataset = Dataset::new(name, DatasetKind::Clone, source.schema.clone(), source.rows.clone());
        dataset.metadata = source.metadata.clone();
        dataset
            .metadata
            .insert("cloned_from".into(), Value::String(source.id.clone()));

        let dataset = self.commit(dataset, true).await?;
        tracing::info!(id = %dataset.id, source_id = %source.id, "Dataset cloned");
        Ok(dataset)
    }

    /// Concatenate the rows of several datasets into a new one.
    ///
    /// Unknown ids are skipped with a warning; at least one must exist. No
    /// schema compatibility is enforced: the merged schema is re-inferred,
    /// so conflicting column types come out as `mixed`.
    pub async fn merge<S: AsRef<str>>(&mut self, ids: &[S], options: MergeOptions) -> Result<Arc<Dataset>, LakeError> {
        let mut sources = Vec::new();
        for id in ids {
            let id = id.as_ref();
            match self.get(id) {
                Some(dataset) => sources.push(dataset),
                None => tracing::warn!(id, "Skipping unknown dataset in merge"),
            }
        }
        if sources.is_empty() {
            let requested: Vec<&str> = ids.iter().map(|id| id.as_ref()).collect();
            return Err(LakeError::not_found(format!(
                "no existing dataset among [{}]",
                requested.join(", ")
            )));
        }

        let rows: Vec<Record> = sources.iter().flat_map(|d| d.rows.iter().cloned()).collect();
        let schema = self.infer(&rows);
        let name = options.name.unwrap_or_else(|| {
            let names: Vec<&str> = sources.iter().map(|d| d.name.as_str()).collect();
            format!("merged: {}", names.join(" + "))
        });

        let mut dataset = Dataset::new(name, DatasetKind::Merged, schema, rows);
        dataset.metadata.insert(
            "source_ids".into(),
            Value::Array(sources.iter().map(|d| Value::String(d.id.clone())).collect()),
        );

        let dataset = self.commit(dataset, options.persist).await?;
        tracing::info!(id = %dataset.id, sources = sources.len(), rows = dataset.row_count(), "Datasets merged");
        Ok(dataset)
    }

    /// Load every stored dataset into the registry. Returns how many were
    /// loaded.
    pub async fn hydrate(&mut self) -> Result<usize, LakeError> {
        let Some(storage) = self.storage.clone() else {
            return Ok(0);
        };
        let stored = storage.load_all().await?;
        let mut loaded = 0;
        for persisted in stored {
            let saved_at = persisted.saved_at;
            let dataset = Arc::new(Dataset::from_persisted(persisted)?);
            self.lifecycle.insert(
                dataset.id.clone(),
                LifecycleEntry::for_dataset(&dataset, Some(saved_at)),
            );
            self.datasets.insert(dataset.id.clone(), dataset);
            loaded += 1;
        }
        tracing::info!(count = loaded, "Hydrated datasets from storage");
        Ok(loaded)
    }

    // -----------------------------------------------------------------------
    // Import / export / query
    // -----------------------------------------------------------------------

    /// Read external input through the adapter for `format` and register the
    /// rows as a `raw-import` dataset.
    pub async fn import(
        &mut self,
        name: impl Into<String>,
        format: &str,
        handle: &ExternalHandle,
        options: &AdapterOptions,
    ) -> Result<Arc<Dataset>, LakeError> {
        let adapter = self.adapters.get(format)?;
        let rows = adapter.read(handle, options).await?;
        let create = CreateOptions::default()
            .with_metadata("source", handle.label())
            .with_metadata("format", format);
        let dataset = self.create(name, rows, create).await?;
        tracing::info!(id = %dataset.id, format, input = %handle.label(), "Dataset imported");
        Ok(dataset)
    }

    /// Render a dataset's rows through the adapter for `format`.
    pub async fn export(&self, id: &str, format: &str, options: &AdapterOptions) -> Result<Vec<u8>, LakeError> {
        let adapter = self.adapters.get(format)?;
        let dataset = self.require(id)?;
        let bytes = adapter.write(&dataset.rows, options).await?;
        tracing::info!(id, format, bytes = bytes.len(), "Dataset exported");
        Ok(bytes)
    }

    /// Run a read query against datasets materialized as tables.
    ///
    /// `tables` maps table names to dataset ids. Query semantics belong to
    /// the SQL engine; an in-memory SQLite engine is created on first use
    /// when none was supplied.
    pub fn query(&self, sql: &str, tables: &[(&str, &str)]) -> Result<Vec<Record>, LakeError> {
        let sources = tables
            .iter()
            .map(|(table, id)| Ok((*table, self.require(id)?)))
            .collect::<Result<Vec<_>, LakeError>>()?;

        let mut guard = self
            .sql
            .lock()
            .map_err(|_| LakeError::query("SQL engine lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(Box::new(SqliteEngine::in_memory()?));
        }
        let Some(engine) = guard.as_mut() else {
            return Err(LakeError::query("SQL engine unavailable"));
        };

        let outcome = run_bound_query(engine.as_mut(), &sources, sql);
        // Bindings last for one query only.
        for (table, _) in &sources {
            if let Err(e) = engine.drop_table(table) {
                tracing::warn!(table, error = %e, "Failed to drop query table");
            }
        }
        let rows = outcome?;
        tracing::debug!(tables = sources.len(), rows = rows.len(), "SQL query finished");
        Ok(rows)
    }
}

fn run_bound_query(
    engine: &mut dyn SqlEngine,
    sources: &[(&str, Arc<Dataset>)],
    sql: &str,
) -> Result<Vec<Record>, LakeError> {
    for (table, dataset) in sources {
        engine.register_table(table, &dataset.rows)?;
    }
    engine.query(sql)
}
