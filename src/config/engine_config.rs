//! Engine Configuration - grid, evaluation, state groups, storage, cache
//!
//! Every section implements `Default` with the built-in values, so a missing
//! file or a partial file behaves exactly like the defaults for the keys it
//! leaves out.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults::{
    DEFAULT_BATCH_SIZE, DEFAULT_LACK_STATES, DEFAULT_SERIES_DB_PATH, DEFAULT_TAG_CACHE_CAPACITY,
    DEFAULT_TAILBACK_STATES, DEFAULT_UNPLANNED_DOWN_STATES,
};
use crate::engine::duration::StateSet;
use crate::engine::grid::GridPolicy;

/// Environment variable pointing at a config file
pub const CONFIG_ENV_VAR: &str = "OEE_CONFIG";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "oee_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for the OEE engine.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$OEE_CONFIG` env var
/// 2. `./oee_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Sampling grid policy
    #[serde(default)]
    pub grid: GridPolicy,

    /// Tick evaluation
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Machine-state code groups
    #[serde(default)]
    pub states: StateGroupsConfig,

    /// Series persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tag metadata cache
    #[serde(default)]
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$OEE_CONFIG` environment variable
    /// 2. `./oee_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from OEE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from OEE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "OEE_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./oee_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./oee_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./oee_config.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No oee_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings and otherwise ignored.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate settings for internal consistency.
    ///
    /// Rules:
    /// - Interval, batch size, and cache capacity must be positive
    /// - `max_ticks` must leave room for the start and the pinned end tick
    /// - The unplanned-down group must not be empty
    /// - State groups must not share codes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.grid.interval_minutes == 0 {
            errors.push("grid.interval_minutes must be > 0".to_string());
        }
        if self.grid.max_ticks < 2 {
            errors.push(format!(
                "grid.max_ticks ({}) must be >= 2",
                self.grid.max_ticks
            ));
        }
        if self.evaluation.batch_size == 0 {
            errors.push("evaluation.batch_size must be > 0".to_string());
        }
        if self.cache.tag_cache_capacity == 0 {
            errors.push("cache.tag_cache_capacity must be > 0".to_string());
        }
        if self.states.unplanned_down.is_empty() {
            errors.push("states.unplanned_down must list at least one state code".to_string());
        }

        let groups: [(&str, &[i64]); 3] = [
            ("unplanned_down", &self.states.unplanned_down),
            ("tailback", &self.states.tailback),
            ("lack", &self.states.lack),
        ];
        for (i, (name_a, codes_a)) in groups.iter().enumerate() {
            for (name_b, codes_b) in groups.iter().skip(i + 1) {
                for code in codes_a.iter().filter(|c| codes_b.contains(c)) {
                    errors.push(format!(
                        "states.{name_a} and states.{name_b} both contain code {code}"
                    ));
                }
            }
        }

        if self.storage.series_db_path.trim().is_empty() {
            errors.push("storage.series_db_path must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

/// Tick evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Ticks per parallel batch
    pub batch_size: usize,
    /// Evaluate open jobs up to a caller-supplied instant instead of failing
    pub allow_open_jobs: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            allow_open_jobs: false,
        }
    }
}

/// Machine-state code groups used by the metric chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StateGroupsConfig {
    /// Codes counted as Unplanned Down Time
    pub unplanned_down: Vec<i64>,
    /// Codes subtracted as tailback (outfeed blocked)
    pub tailback: Vec<i64>,
    /// Codes subtracted as lack (infeed starved)
    pub lack: Vec<i64>,
}

impl Default for StateGroupsConfig {
    fn default() -> Self {
        Self {
            unplanned_down: DEFAULT_UNPLANNED_DOWN_STATES.to_vec(),
            tailback: DEFAULT_TAILBACK_STATES.to_vec(),
            lack: DEFAULT_LACK_STATES.to_vec(),
        }
    }
}

impl StateGroupsConfig {
    pub fn unplanned_down_set(&self) -> StateSet {
        StateSet::from_raw(&self.unplanned_down)
    }

    pub fn tailback_set(&self) -> StateSet {
        StateSet::from_raw(&self.tailback)
    }

    pub fn lack_set(&self) -> StateSet {
        StateSet::from_raw(&self.lack)
    }
}

/// Series persistence settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub series_db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            series_db_path: DEFAULT_SERIES_DB_PATH.to_string(),
        }
    }
}

/// Tag metadata cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub tag_cache_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tag_cache_capacity: DEFAULT_TAG_CACHE_CAPACITY,
        }
    }
}
