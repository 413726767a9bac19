//! Engine Configuration Module
//!
//! Grid policy, evaluation batching, machine-state groups, and storage paths
//! loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `OEE_CONFIG` environment variable (path to TOML file)
//! 2. `oee_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(EngineConfig::load());
//!
//! // Anywhere else:
//! let interval = config::get().grid.interval_minutes;
//! ```

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;

use std::sync::OnceLock;

/// Global engine configuration, initialized once at startup.
static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Initialize the global engine configuration. Later calls are ignored.
pub fn init(config: EngineConfig) {
    if ENGINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Global engine configuration, or the built-in defaults when `init()` has
/// not run (library callers and tests).
pub fn get() -> &'static EngineConfig {
    ENGINE_CONFIG.get_or_init(EngineConfig::default)
}
