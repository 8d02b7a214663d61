//! Store configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::Lifetime;
use crate::document::DEFAULT_PRIMARY_KEY;
use crate::errors::{StoreError, StoreResult};
use crate::finder::{SearchAlgorithm, SearchMode};

/// How new primary keys are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random v4 UUIDs
    #[default]
    Uuid,
    /// Integers from the store's persisted counter
    Counter,
}

/// Defaults for full-text search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Terms shorter than this many characters are ignored
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Whether every term or any term must occur in a field
    #[serde(default)]
    pub mode: SearchMode,

    /// Field the score is written to; `None` leaves documents untouched
    #[serde(default = "default_score_key")]
    pub score_key: Option<String>,

    /// Ranking algorithm
    #[serde(default)]
    pub algorithm: SearchAlgorithm,
}

fn default_min_length() -> usize {
    2
}

fn default_score_key() -> Option<String> {
    Some("searchScore".to_string())
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            mode: SearchMode::default(),
            score_key: default_score_key(),
            algorithm: SearchAlgorithm::default(),
        }
    }
}

/// Per-store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Name of the primary-key field (default: "_id")
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Whether queries use the cache unless told otherwise (default: true)
    #[serde(default = "default_auto_cache")]
    pub auto_cache: bool,

    /// Lifetime of cache entries in seconds; `None` lives until the next write
    #[serde(default)]
    pub cache_lifetime: Option<u64>,

    /// Primary key strategy (default: uuid)
    #[serde(default)]
    pub id_strategy: IdStrategy,

    /// Search defaults
    #[serde(default)]
    pub search: SearchOptions,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_auto_cache() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            auto_cache: default_auto_cache(),
            cache_lifetime: None,
            id_strategy: IdStrategy::default(),
            search: SearchOptions::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::io(format!("Failed to read config {}", path.display()), e)
        })?;

        let config: StoreConfig = serde_json::from_str(&content).map_err(|e| {
            StoreError::configuration(format!("Invalid config JSON: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> StoreResult<()> {
        if self.primary_key.trim().is_empty() {
            return Err(StoreError::configuration("primary_key must not be empty"));
        }
        if self.primary_key.contains('.') {
            return Err(StoreError::configuration(format!(
                "primary_key '{}' must be a top-level field name",
                self.primary_key
            )));
        }
        if self.search.min_length == 0 {
            return Err(StoreError::configuration("search.min_length must be > 0"));
        }
        Ok(())
    }

    /// Config using integer ids, as most fixtures want
    pub fn with_counter_ids() -> Self {
        Self {
            id_strategy: IdStrategy::Counter,
            ..Default::default()
        }
    }

    /// Default cache lifetime as a [`Lifetime`]
    pub fn default_lifetime(&self) -> Lifetime {
        Lifetime::from_seconds(self.cache_lifetime)
    }
}
