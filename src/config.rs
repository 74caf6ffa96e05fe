//! Processor configuration.
//!
//! Loaded from an optional `thumbwork.toml`. Stock defaults are the base
//! layer; the file only needs the keys it wants to override. Unknown keys are
//! rejected.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [workers]
//! max_threads = 4           # Max parallel workers (omit for auto = CPU cores)
//!
//! [rotate]
//! background = "#000000"    # Fill for canvas exposed by free-angle rotation
//! ```
//!
//! CLI flags override file values (see `--threads`).

use crate::imaging::Background;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "thumbwork.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Processor configuration loaded from `thumbwork.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Worker pool settings.
    pub workers: WorkersConfig,
    /// Rotation settings.
    pub rotate: RotateConfig,
}

impl ProcessorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "workers.max_threads must be at least 1".into(),
            ));
        }
        if Background::parse_hex(&self.rotate.background).is_none() {
            return Err(ConfigError::Validation(format!(
                "rotate.background must be #RRGGBB or #RRGGBBAA, got {:?}",
                self.rotate.background
            )));
        }
        Ok(())
    }

    /// Parsed rotation background. Falls back to black on an unvalidated value.
    pub fn background(&self) -> Background {
        Background::parse_hex(&self.rotate.background).unwrap_or_default()
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkersConfig {
    /// Maximum number of worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Rotation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotateConfig {
    /// `#RRGGBB` or `#RRGGBBAA`.
    pub background: String,
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            background: "#000000".to_string(),
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &WorkersConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_threads
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ProcessorConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `path`, merged over stock defaults and validated.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ProcessorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: ProcessorConfig = merged.try_into()?;
    config.validate()?;
    tracing::debug!(path = %path.display(), ?config, "config loaded");
    Ok(config)
}

/// Returns a fully-commented stock `thumbwork.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# thumbwork configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Worker pool
# ---------------------------------------------------------------------------
[workers]
# Maximum number of parallel image workers.
# Omit to use one worker per CPU core. Values above the core count are
# clamped down. The --threads flag overrides this.
# max_threads = 4

# ---------------------------------------------------------------------------
# Rotation
# ---------------------------------------------------------------------------
[rotate]
# Fill color for canvas exposed by rotations that are not a multiple of 90°.
# Format: "#RRGGBB" or "#RRGGBBAA".
background = "#000000"
"##
}
