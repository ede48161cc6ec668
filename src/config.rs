//! Assembly configuration.
//!
//! Handles loading and validating an optional `mets.toml` placed in the
//! input directory of a batch. Stock defaults are overridden key by key by
//! whatever the file specifies.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [file_groups]
//! usage_type = "VIEW"        # USE attribute on every fileGrp
//!
//! [struct_map]
//! map_type = "PHYSICAL"      # structMap TYPE
//! div_type = "FILE"          # TYPE of each per-file div
//!
//! [checksums]
//! enabled = true             # Record CHECKSUM/CHECKSUMTYPE on each file
//! algorithm = "SHA-256"      # Only SHA-256 is supported
//!
//! [processing]
//! max_processes = 4          # Max parallel inspection workers (omit for auto)
//!
//! [output]
//! indent = 2                 # Pretty-print indent width (1-8)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::inspect::SHA256;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the input directory.
pub const CONFIG_FILENAME: &str = "mets.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Assembly configuration loaded from `mets.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FactoryConfig {
    pub file_groups: FileGroupsConfig,
    pub struct_map: StructMapConfig,
    pub checksums: ChecksumConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
}

impl FactoryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_groups.usage_type.trim().is_empty() {
            return Err(ConfigError::Validation(
                "file_groups.usage_type must not be empty".into(),
            ));
        }
        if self.struct_map.map_type.trim().is_empty() || self.struct_map.div_type.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "struct_map.map_type and struct_map.div_type must not be empty".into(),
            ));
        }
        if self.checksums.algorithm != SHA256 {
            return Err(ConfigError::Validation(format!(
                "checksums.algorithm must be {SHA256}, got {}",
                self.checksums.algorithm
            )));
        }
        if !(1..=8).contains(&self.output.indent) {
            return Err(ConfigError::Validation(
                "output.indent must be 1-8".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileGroupsConfig {
    pub usage_type: String,
}

impl Default for FileGroupsConfig {
    fn default() -> Self {
        Self {
            usage_type: "VIEW".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StructMapConfig {
    pub map_type: String,
    pub div_type: String,
}

impl Default for StructMapConfig {
    fn default() -> Self {
        Self {
            map_type: "PHYSICAL".into(),
            div_type: "FILE".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksumConfig {
    pub enabled: bool,
    pub algorithm: String,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: SHA256.into(),
        }
    }
}

/// Parallel inspection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel inspection workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub indent: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a `toml::Value::Table`, the base layer for merging.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(FactoryConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
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

/// Load `mets.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `mets.toml` in the given directory, falling back to
/// stock defaults for everything the file leaves out.
pub fn load_config(dir: &Path) -> Result<FactoryConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(dir)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: FactoryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// A fully-commented stock `mets.toml`. Used by the `gen-config` command.
pub fn stock_config_toml() -> &'static str {
    r##"# METS Factory Configuration
# ==========================
# Place this file as mets.toml in a batch input directory.
# All options are optional; values shown are the defaults.

[file_groups]
# USE attribute written on every fileGrp.
usage_type = "VIEW"

[struct_map]
# TYPE of the structMap element.
map_type = "PHYSICAL"
# TYPE of each per-file division.
div_type = "FILE"

[checksums]
# Record CHECKSUM and CHECKSUMTYPE on every file entry.
enabled = true
# Only SHA-256 is supported.
algorithm = "SHA-256"

[processing]
# Maximum parallel workers hashing files. Omit to use all CPU cores.
# max_processes = 4

[output]
# Indent width used when pretty-printing the document (1-8).
indent = 2
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, FactoryConfig::default());
        assert_eq!(config.file_groups.usage_type, "VIEW");
        assert_eq!(config.struct_map.map_type, "PHYSICAL");
        assert!(config.checksums.enabled);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[struct_map]\ndiv_type = \"PAGE\"\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();

        assert_eq!(config.struct_map.div_type, "PAGE");
        assert_eq!(config.struct_map.map_type, "PHYSICAL");
        assert_eq!(config.output.indent, 2);
    }

    #[test]
    fn unknown_keys_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[checksums]\nenabeld = false\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unsupported_algorithm_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[checksums]\nalgorithm = \"MD5\"\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn indent_out_of_range_rejected() {
        let mut config = FactoryConfig::default();
        config.output.indent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let parsed: FactoryConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, FactoryConfig::default());
    }

    #[test]
    fn merge_overrides_nested_keys() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn effective_threads_never_exceeds_cores() {
        let cores = effective_threads(&ProcessingConfig::default());
        let capped = effective_threads(&ProcessingConfig {
            max_processes: Some(1),
        });
        assert!(cores >= 1);
        assert_eq!(capped, 1);
    }
}
