use crate::index::bucketer::MAX_BUCKETS;
use crate::index::search::SearchOptions;
use crate::index::tabular::DEFAULT_PAGE_CACHE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "kansearch";
const CONFIG_FILE: &str = "config.json";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Number of mask buckets the alphabet is spread over (1..=32)
    #[serde(default = "default_bucket_count")]
    pub bucket_count: usize,

    /// Result cap per search; 0 means unlimited
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// File name pattern selecting corpus files inside a directory
    #[serde(default = "default_corpus_glob")]
    pub corpus_glob: String,

    /// Wall-clock limit per search in milliseconds; 0 means none
    #[serde(default)]
    pub search_timeout_ms: u64,

    /// Edge pages kept in memory when searching an exported tree
    #[serde(default = "default_page_cache_capacity")]
    pub page_cache_capacity: usize,
}

fn default_bucket_count() -> usize {
    MAX_BUCKETS
}

fn default_max_results() -> usize {
    40
}

fn default_corpus_glob() -> String {
    "*.jsonl".to_string()
}

fn default_page_cache_capacity() -> usize {
    DEFAULT_PAGE_CACHE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bucket_count: default_bucket_count(),
            max_results: default_max_results(),
            corpus_glob: default_corpus_glob(),
            search_timeout_ms: 0,
            page_cache_capacity: default_page_cache_capacity(),
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Load config from `path`, or return default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the app data directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Bucket count clamped to what a mask can hold
    pub fn effective_bucket_count(&self) -> usize {
        self.bucket_count.clamp(1, MAX_BUCKETS)
    }

    /// `None` when searches may run without a deadline
    pub fn search_timeout(&self) -> Option<Duration> {
        (self.search_timeout_ms > 0).then(|| Duration::from_millis(self.search_timeout_ms))
    }

    /// Search limits with the deadline starting now. `max` and
    /// `timeout_ms` come from the command line and win over the file.
    pub fn search_options(&self, max: Option<usize>, timeout_ms: Option<u64>) -> SearchOptions {
        let timeout = timeout_ms
            .map(Duration::from_millis)
            .or(self.search_timeout())
            .unwrap_or(Duration::ZERO);
        SearchOptions::with_max(max.unwrap_or(self.max_results)).timeout(timeout)
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create {}", app_dir.display()))?;
    Ok(app_dir)
}
