use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory holding `*.c.json` exports
    pub source_dir: PathBuf,
    pub database_path: PathBuf,
    /// Prefix of generated permalinks
    pub base_url: String,
    pub max_tree_depth: usize,
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    pub max_recent_limit: usize,
    pub preview_chars: usize,
    pub breadcrumb_chars: usize,
    pub sibling_window: usize,
    pub child_limit: usize,
    /// Rendered outputs above this many estimated tokens carry a warning
    pub token_warning_threshold: usize,
    pub refresh_interval_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data"),
            database_path: PathBuf::from("dynarchive.db"),
            base_url: "https://dynalist.io".to_string(),
            max_tree_depth: 256,
            default_search_limit: 10,
            max_search_limit: 50,
            max_recent_limit: 100,
            preview_chars: 120,
            breadcrumb_chars: 40,
            sibling_window: 3,
            child_limit: 20,
            token_warning_threshold: 5000,
            refresh_interval_secs: 300,
        }
    }
}

impl ArchiveConfig {
    pub fn refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_interval_secs as i64)
    }

    /// Clamp a caller-supplied search limit, falling back to the default
    pub fn search_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_search_limit)
            .clamp(1, self.max_search_limit.max(1))
    }

    pub fn recent_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_search_limit)
            .clamp(1, self.max_recent_limit.max(1))
    }
}

/// Load the config at `path`, writing the defaults there first if it is missing.
pub fn load_config(path: &Path) -> Result<ArchiveConfig> {
    if !path.exists() {
        let config = ArchiveConfig::default();
        let toml = toml::to_string(&config).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("Wrote default config to {}", path.display());
        return Ok(config);
    }

    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}
