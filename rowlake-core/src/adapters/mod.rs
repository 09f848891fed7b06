//! Format adapters: the read/write boundary between external bytes and rows.
//!
//! Adapters are dispatched by a format tag through an [`AdapterRegistry`].
//! An unknown tag fails with [`LakeError::UnsupportedFormat`].

pub mod delimited;
pub mod embedded_sql;
pub mod structured;

pub use delimited::DelimitedTextAdapter;
pub use embedded_sql::EmbeddedSqlAdapter;
pub use structured::StructuredTextAdapter;

use crate::config::ImportConfig;
use crate::data::record::Record;
use crate::error::LakeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DELIMITED_TEXT: &str = "delimited-text";
pub const STRUCTURED_TEXT: &str = "structured-text";
pub const EMBEDDED_SQL: &str = "embedded-sql";

/// Where an adapter reads its input from.
#[derive(Debug, Clone)]
pub enum ExternalHandle {
    /// In-memory bytes, labelled for error messages.
    Bytes { label: String, data: Vec<u8> },
    Path(PathBuf),
}

impl ExternalHandle {
    pub fn bytes(label: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            label: label.into(),
            data: data.into(),
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Human-readable name of the input, used in adapter errors.
    pub fn label(&self) -> String {
        match self {
            Self::Bytes { label, .. } => label.clone(),
            Self::Path(p) => p.display().to_string(),
        }
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>, LakeError> {
        match self {
            Self::Bytes { data, .. } => Ok(data.clone()),
            Self::Path(p) => tokio::fs::read(p)
                .await
                .map_err(|e| LakeError::adapter(self.label(), e.to_string())),
        }
    }
}

/// Options shared by all adapters; each adapter reads the ones it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    pub delimiter: char,
    pub has_header: bool,
    /// Coerce delimited-text cells into numbers, booleans and nulls.
    pub infer_types: bool,
    pub json_lines: bool,
    pub pretty: bool,
    /// Table name for embedded-sql reads and writes.
    pub table: Option<String>,
    /// Query for embedded-sql reads.
    pub query: Option<String>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            infer_types: true,
            json_lines: false,
            pretty: false,
            table: None,
            query: None,
        }
    }
}

impl From<&ImportConfig> for AdapterOptions {
    fn from(config: &ImportConfig) -> Self {
        Self {
            delimiter: config.delimiter,
            infer_types: config.infer_types,
            json_lines: config.json_lines,
            ..Self::default()
        }
    }
}

/// A format-specific converter between external bytes and rows.
#[async_trait]
pub trait FormatAdapter: Send + Sync {
    /// The dispatch tag, e.g. `"delimited-text"`.
    fn tag(&self) -> &'static str;

    async fn read(&self, handle: &ExternalHandle, options: &AdapterOptions) -> Result<Vec<Record>, LakeError>;

    async fn write(&self, rows: &[Record], options: &AdapterOptions) -> Result<Vec<u8>, LakeError>;
}

/// Tag-keyed collection of adapters.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn FormatAdapter>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in delimited-text, structured-text and
    /// embedded-sql adapters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(DelimitedTextAdapter));
        registry.register(Arc::new(StructuredTextAdapter));
        registry.register(Arc::new(EmbeddedSqlAdapter));
        registry
    }

    /// Add or replace the adapter for its tag.
    pub fn register(&mut self, adapter: Arc<dyn FormatAdapter>) {
        self.adapters.insert(adapter.tag().to_string(), adapter);
    }

    pub fn get(&self, tag: &str) -> Result<Arc<dyn FormatAdapter>, LakeError> {
        self.adapters
            .get(tag)
            .cloned()
            .ok_or_else(|| LakeError::unsupported_format(tag))
    }

    pub fn tags(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

/// Guess a format tag from a file extension.
pub fn format_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" | "tsv" | "txt" => Some(DELIMITED_TEXT),
        "json" | "jsonl" | "ndjson" => Some(STRUCTURED_TEXT),
        "db" | "sqlite" | "sqlite3" | "sql" => Some(EMBEDDED_SQL),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_dispatch() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.tags(), vec![DELIMITED_TEXT, EMBEDDED_SQL, STRUCTURED_TEXT]);
        assert_eq!(registry.get(DELIMITED_TEXT).unwrap().tag(), DELIMITED_TEXT);
    }

    #[test]
    fn test_unknown_tag_is_unsupported() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry.get("spreadsheet").err().unwrap();
        assert!(matches!(err, LakeError::UnsupportedFormat(ref t) if t == "spreadsheet"));
    }

    #[test]
    fn test_format_for_path() {
        assert_eq!(format_for_path(Path::new("a/b.CSV")), Some(DELIMITED_TEXT));
        assert_eq!(format_for_path(Path::new("x.jsonl")), Some(STRUCTURED_TEXT));
        assert_eq!(format_for_path(Path::new("x.sqlite")), Some(EMBEDDED_SQL));
        assert_eq!(format_for_path(Path::new("x.parquet")), None);
        assert_eq!(format_for_path(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn test_missing_path_names_input() {
        let handle = ExternalHandle::path("/definitely/not/here.csv");
        let err = handle.read_bytes().await.unwrap_err();
        assert!(matches!(err, LakeError::Adapter { ref input, .. } if input.contains("here.csv")));
    }
}
