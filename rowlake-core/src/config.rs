//! Configuration for rowlake.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides. Files live at
//! `~/.config/rowlake/config.toml` and `<workspace>/.rowlake/config.toml`.

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which storage collaborator a lake is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the file backend. Relative paths resolve against the
    /// workspace.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from(".rowlake/datasets"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Rows examined when inferring a schema; 0 examines every row.
    pub sample_rows: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { sample_rows: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub delimiter: char,
    pub infer_types: bool,
    pub json_lines: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            infer_types: true,
            json_lines: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub page_size: usize,
    /// Pages kept on each side of the current page.
    pub cache_window: usize,
    pub prefetch: bool,
    pub chunk_size: usize,
    pub memory_threshold_mb: u64,
    pub item_height: f64,
    pub viewport_height: f64,
    pub buffer: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            cache_window: 1,
            prefetch: true,
            chunk_size: 1000,
            memory_threshold_mb: 512,
            item_height: 24.0,
            viewport_height: 600.0,
            buffer: 5,
        }
    }
}

impl PerformanceConfig {
    pub fn memory_threshold_bytes(&self) -> u64 {
        self.memory_threshold_mb.saturating_mul(1024 * 1024)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LakeConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

impl LakeConfig {
    /// Human-readable problems with this configuration. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let perf = &self.performance;

        if perf.page_size == 0 {
            problems.push("performance.page_size must be greater than 0".to_string());
        }
        if perf.chunk_size == 0 {
            problems.push("performance.chunk_size must be greater than 0".to_string());
        }
        if !(perf.item_height.is_finite() && perf.item_height > 0.0) {
            problems.push(format!(
                "performance.item_height must be positive, got {}",
                perf.item_height
            ));
        }
        if !(perf.viewport_height.is_finite() && perf.viewport_height >= 0.0) {
            problems.push(format!(
                "performance.viewport_height must not be negative, got {}",
                perf.viewport_height
            ));
        }
        if perf.memory_threshold_mb == 0 {
            problems.push("performance.memory_threshold_mb is 0; reclaim will always trigger".to_string());
        }
        if !self.import.delimiter.is_ascii() || matches!(self.import.delimiter, '\n' | '\r' | '"') {
            problems.push(format!(
                "import.delimiter {:?} is not usable as a field separator",
                self.import.delimiter
            ));
        }
        if self.storage.backend == StorageBackend::File && self.storage.data_dir.as_os_str().is_empty() {
            problems.push("storage.data_dir is empty but the file backend is selected".to_string());
        }

        problems
    }

    /// Resolve the data directory against a workspace root.
    pub fn data_dir(&self, workspace: &Path) -> PathBuf {
        if self.storage.data_dir.is_absolute() {
            self.storage.data_dir.clone()
        } else {
            workspace.join(&self.storage.data_dir)
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// User-level config file location, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "rowlake", "rowlake").map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration, layering sources from lowest to highest priority.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&LakeConfig>,
) -> Result<LakeConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(LakeConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".rowlake").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // ROWLAKE_PERFORMANCE__PAGE_SIZE, ROWLAKE_STORAGE__BACKEND, ...
    figment = figment.merge(Env::prefixed("ROWLAKE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = LakeConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.performance.page_size, 100);
        assert_eq!(config.inference.sample_rows, 1000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.performance.memory_threshold_bytes(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config = LakeConfig::default();
        config.performance.page_size = 0;
        config.performance.chunk_size = 0;
        config.import.delimiter = '"';
        let problems = config.validate();
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("page_size"));
    }

    #[test]
    fn test_workspace_file_layer() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".rowlake")).unwrap();
        std::fs::write(
            dir.path().join(".rowlake/config.toml"),
            "[performance]\npage_size = 25\n\n[storage]\nbackend = \"file\"\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.performance.page_size, 25);
        assert_eq!(config.performance.chunk_size, 1000);
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_overrides_win() {
        let mut overrides = LakeConfig::default();
        overrides.import.delimiter = ';';
        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.import.delimiter, ';');
    }

    #[test]
    fn test_toml_round_trip() {
        let config = LakeConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[performance]"));
        let parsed: LakeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_data_dir_resolution() {
        let config = LakeConfig::default();
        assert_eq!(config.data_dir(Path::new("/ws")), PathBuf::from("/ws/.rowlake/datasets"));
    }
}
