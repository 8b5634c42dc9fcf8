//! Index configuration, loadable from TOML.

use crate::error::{ExtLinksError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the link index and the document stores that feed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// File extensions (without the dot) treated as indexable documents.
    pub extensions: Vec<String>,
    /// Maximum number of concurrent content reads during a full scan.
    pub scan_concurrency: usize,
    /// Capacity of the document event channel.
    pub event_buffer: usize,
    /// Drop a URL key once no document references it anymore.
    pub prune_empty_urls: bool,
    /// Directory names never descended into by filesystem stores.
    pub ignore_dirs: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string()],
            scan_concurrency: 32,
            event_buffer: 1000,
            prune_empty_urls: true,
            ignore_dirs: [".git", ".obsidian", ".trash", "node_modules", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl IndexConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ExtLinksError::Config(e.to_string()))
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Effective read concurrency; zero is clamped to one.
    pub fn effective_concurrency(&self) -> usize {
        self.scan_concurrency.max(1)
    }

    /// Whether `path` carries one of the configured extensions (case-insensitive).
    pub fn is_indexable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Whether a directory with this name should be skipped.
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignore_dirs.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_index_markdown_only() {
        let config = IndexConfig::default();
        assert!(config.is_indexable(Path::new("notes/today.md")));
        assert!(config.is_indexable(Path::new("notes/LOUD.MD")));
        assert!(!config.is_indexable(Path::new("image.png")));
        assert!(!config.is_indexable(Path::new("Makefile")));
        assert!(config.prune_empty_urls);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = IndexConfig::from_toml("extensions = [\"md\", \"txt\"]\n").unwrap();
        assert_eq!(config.extensions, vec!["md", "txt"]);
        assert_eq!(config.scan_concurrency, 32);
        assert_eq!(config.event_buffer, 1000);
        assert!(config.is_ignored_dir(".git"));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = IndexConfig::from_toml("scan_concurrency = \"lots\"").unwrap_err();
        assert!(matches!(err, ExtLinksError::Config(_)));
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let config = IndexConfig {
            scan_concurrency: 0,
            ..IndexConfig::default()
        };
        assert_eq!(config.effective_concurrency(), 1);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extlinks.toml");
        std::fs::write(&path, "prune_empty_urls = false\nscan_concurrency = 4\n").unwrap();
        let config = IndexConfig::load_or_default(Some(&path)).unwrap();
        assert!(!config.prune_empty_urls);
        assert_eq!(config.scan_concurrency, 4);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = IndexConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ExtLinksError::Io(_)));
    }
}
