//! Configuration Management
//!
//! Handles persistent configuration storage for gcp-inventory.

use crate::crawler::DEFAULT_THREADS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Default crawl root, e.g. `organizations/123`
    #[serde(default)]
    pub root_resource_id: Option<String>,
    /// Parallel crawler worker count
    #[serde(default)]
    pub threads: Option<usize>,
    /// Where inventories are written
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// Variables passed to every crawl
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcp-inventory").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable config: {:#}", e);
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective root (config > gcloud default project)
    pub fn effective_root(&self) -> Option<String> {
        self.root_resource_id
            .clone()
            .or_else(crate::gcp::auth::default_root_resource_id)
    }

    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or(DEFAULT_THREADS)
    }

    /// Get effective output path (config > timestamped file in the data dir)
    pub fn effective_output(&self) -> PathBuf {
        if let Some(path) = &self.output_path {
            return path.clone();
        }

        let file_name = format!(
            "inventory-{}.jsonl",
            chrono::Utc::now().format("%Y%m%dT%H%M%SZ")
        );
        dirs::data_dir()
            .map(|p| p.join("gcp-inventory"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(file_name)
    }
}
