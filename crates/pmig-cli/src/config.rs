//! `pmig.toml` configuration
//!
//! Every section is optional and falls back to its defaults. Relative paths
//! are resolved against the working directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "pmig.toml";

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Full migration configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Legacy exports
    pub source: SourceConfig,
    /// Written records
    pub target: TargetConfig,
    /// Identifier map
    pub state: StateConfig,
    /// Run defaults
    pub run: RunConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// `[source]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Directory holding `<entity>.jsonl` exports
    pub dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("legacy"),
        }
    }
}

/// `[target]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Directory receiving `<entity>.jsonl` output
    pub dir: PathBuf,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("target"),
        }
    }
}

/// `[state]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    /// Identifier map file
    pub id_map: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            id_map: PathBuf::from("state/id_map.jsonl"),
        }
    }
}

/// `[run]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Records per source read
    pub batch_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: pmig_pipeline::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `pmig_pipeline=debug`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl MigrationConfig {
    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// used when present and the defaults otherwise.
    ///
    /// # Errors
    /// - [`ConfigError`] if the file cannot be read, parsed or validated
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    tracing::debug!("no {DEFAULT_CONFIG_FILE}, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// - [`ConfigError::Parse`] or [`ConfigError::InvalidValue`]
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - [`ConfigError::InvalidValue`] naming the offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "run.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level",
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = MigrationConfig::from_toml_str("").unwrap();
        assert_eq!(config, MigrationConfig::default());
        assert_eq!(config.run.batch_size, 500);
        assert_eq!(config.state.id_map, PathBuf::from("state/id_map.jsonl"));
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn sections_override_defaults() {
        let config = MigrationConfig::from_toml_str(
            r#"
            [source]
            dir = "/data/legacy"

            [run]
            batch_size = 50

            [logging]
            level = "pmig_pipeline=debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.dir, PathBuf::from("/data/legacy"));
        assert_eq!(config.target, TargetConfig::default());
        assert_eq!(config.run.batch_size, 50);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = MigrationConfig::from_toml_str("[run]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "run.batch_size",
                ..
            }
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = MigrationConfig::from_toml_str("[run]\nbatchsize = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let err = MigrationConfig::from_toml_str("[logging]\nlevel = \"pmig=loud\"\n").unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MigrationConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pmig.toml");
        std::fs::write(&path, "[target]\ndir = \"out\"\n").unwrap();
        let config = MigrationConfig::load(Some(&path)).unwrap();
        assert_eq!(config.target.dir, PathBuf::from("out"));
    }
}
