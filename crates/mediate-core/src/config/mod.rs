//! Mediator configuration
//!
//! Loaded from TOML, overridden from `MEDIATE_*` environment variables or
//! individual `key=value` strings, then validated before a mediator is built.

pub mod validation;

pub use validation::{ConfigValidator, ValidationError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables read by [`MediateConfig::merge_with_env`]
pub const ENV_PREFIX: &str = "MEDIATE_";

/// Largest accepted initial plan cache capacity
pub const MAX_PLAN_CACHE_CAPACITY: u32 = 65_536;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML for this type
    #[error("Invalid TOML: {source}")]
    Parse {
        /// Parser failure with its location
        #[source]
        source: toml::de::Error,
    },

    /// Key is not part of the configuration
    #[error("Unknown configuration key: {key}")]
    UnknownKey {
        /// Key as given
        key: String,
    },

    /// Value could not be parsed for its key
    #[error("Invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        /// Key being set
        key: String,
        /// Raw value that failed to parse
        value: String,
        /// Parser message
        message: String,
    },

    /// Configuration parsed but failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Loading and validation shared by mediate configuration types
pub trait MediateConfig: Clone + Default + Send + Sync + 'static {
    /// Get default configuration values
    fn defaults() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    fn from_toml_str(content: &str) -> Result<Self, ConfigError>;

    /// Load configuration from a TOML file
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Merge with `MEDIATE_*` environment variables
    fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge with `(name, value)` pairs shaped like environment variables.
    ///
    /// Names without the prefix and unknown keys are skipped; malformed values fail.
    fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match self.set_from_string(&key.to_lowercase(), &value) {
                Ok(()) => {}
                Err(ConfigError::UnknownKey { key }) => {
                    tracing::debug!(%key, "ignoring unknown mediate environment variable");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Set a configuration value from a string (for CLI or env parsing)
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Settings of the dispatcher and its plan cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// Initial capacity of the plan cache
    pub plan_cache_capacity: usize,
    /// Shard amount of the plan cache map; must be a power of two greater than one
    pub plan_cache_shards: Option<usize>,
    /// Dispatches slower than this are logged at `warn`
    pub slow_dispatch_threshold_ms: Option<u64>,
    /// Emit a span and debug events for every dispatch
    pub trace_dispatch: bool,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            plan_cache_capacity: 64,
            plan_cache_shards: None,
            slow_dispatch_threshold_ms: None,
            trace_dispatch: true,
        }
    }
}

impl MediatorConfig {
    /// Slow-dispatch threshold as a `Duration`
    pub fn slow_dispatch_threshold(&self) -> Option<Duration> {
        self.slow_dispatch_threshold_ms.map(Duration::from_millis)
    }

    /// Validate and return every problem, not only the first
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        let mut validator = ConfigValidator::new();
        let capacity = u32::try_from(self.plan_cache_capacity).unwrap_or(u32::MAX);
        validator.range(
            "plan_cache_capacity",
            capacity,
            Some(1),
            Some(MAX_PLAN_CACHE_CAPACITY),
        );
        if let Some(shards) = self.plan_cache_shards {
            validator.custom(
                "plan_cache_shards",
                &shards,
                |s| *s > 1 && s.is_power_of_two(),
                "must be a power of two greater than one",
            );
        }
        if let Some(threshold) = self.slow_dispatch_threshold_ms {
            validator.custom(
                "slow_dispatch_threshold_ms",
                &threshold,
                |t| *t > 0,
                "must be greater than zero when set",
            );
        }
        validator.all_errors()
    }
}

impl MediateConfig for MediatorConfig {
    fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse { source })
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "plan_cache_capacity" | "plan-cache-capacity" => {
                self.plan_cache_capacity = parse_value(key, value)?;
            }
            "plan_cache_shards" | "plan-cache-shards" => {
                self.plan_cache_shards = parse_optional(key, value)?;
            }
            "slow_dispatch_threshold_ms" | "slow-dispatch-threshold-ms" => {
                self.slow_dispatch_threshold_ms = parse_optional(key, value)?;
            }
            "trace_dispatch" | "trace-dispatch" => {
                self.trace_dispatch = parse_value(key, value)?;
            }
            _ => {
                return Err(ConfigError::UnknownKey {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.validation_errors().into_iter().next() {
            None => Ok(()),
            Some(first) => Err(first.into()),
        }
    }
}

fn parse_value<V>(key: &str, value: &str) -> Result<V, ConfigError>
where
    V: std::str::FromStr,
    V::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: V::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: err.to_string(),
    })
}

/// Empty or `none` clears an optional setting
fn parse_optional<V>(key: &str, value: &str) -> Result<Option<V>, ConfigError>
where
    V: std::str::FromStr,
    V::Err: std::fmt::Display,
{
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        parse_value(key, trimmed).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = MediatorConfig::defaults();
        assert_eq!(config.plan_cache_capacity, 64);
        assert!(config.trace_dispatch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MediatorConfig::from_toml_str("slow_dispatch_threshold_ms = 250\n").unwrap();
        assert_eq!(config.slow_dispatch_threshold(), Some(Duration::from_millis(250)));
        assert_eq!(config.plan_cache_capacity, 64);
    }

    #[test]
    fn load_from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "plan_cache_capacity = 8\nplan_cache_shards = 4\ntrace_dispatch = false").unwrap();

        let config = MediatorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.plan_cache_capacity, 8);
        assert_eq!(config.plan_cache_shards, Some(4));
        assert!(!config.trace_dispatch);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = MediatorConfig::load_from_file(&dir.path().join("absent.toml"));
        assert_matches!(result, Err(ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = MediatorConfig::from_toml_str("plan_cache_capacity = \"many\"");
        assert_matches!(result, Err(ConfigError::Parse { .. }));
    }

    #[test]
    fn vars_override_and_skip_unknown() {
        let mut config = MediatorConfig::default();
        config
            .merge_with_vars(vec![
                ("MEDIATE_PLAN_CACHE_SHARDS".to_string(), "16".to_string()),
                ("MEDIATE_TRACE_DISPATCH".to_string(), "false".to_string()),
                ("MEDIATE_SOMETHING_ELSE".to_string(), "x".to_string()),
                ("PATH".to_string(), "/usr/bin".to_string()),
            ])
            .unwrap();
        assert_eq!(config.plan_cache_shards, Some(16));
        assert!(!config.trace_dispatch);
    }

    #[test]
    fn malformed_var_fails() {
        let mut config = MediatorConfig::default();
        let result = config.merge_with_vars(vec![(
            "MEDIATE_PLAN_CACHE_CAPACITY".to_string(),
            "lots".to_string(),
        )]);
        assert_matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key == "plan_cache_capacity");
    }

    #[test]
    fn optional_values_can_be_cleared() {
        let mut config = MediatorConfig {
            slow_dispatch_threshold_ms: Some(10),
            ..MediatorConfig::default()
        };
        config.set_from_string("slow-dispatch-threshold-ms", "none").unwrap();
        assert_eq!(config.slow_dispatch_threshold_ms, None);
        assert_matches!(
            config.set_from_string("retries", "3"),
            Err(ConfigError::UnknownKey { .. })
        );
    }

    #[test]
    fn capacity_must_be_in_range() {
        for capacity in [0, 1 << 20] {
            let config = MediatorConfig {
                plan_cache_capacity: capacity,
                ..MediatorConfig::default()
            };
            let errors = config.validation_errors();
            assert_eq!(errors.len(), 1);
            assert_matches!(
                &errors[0],
                ValidationError::OutOfRange { field, min: Some(_), max: Some(_), .. }
                    if field == "plan_cache_capacity"
            );
        }

        let mut config = MediatorConfig::default();
        config.set_from_string("plan_cache_capacity", "65536").unwrap();
        assert!(config.validate().is_ok());
        config.set_from_string("plan_cache_capacity", "65537").unwrap();
        assert_matches!(config.validate(), Err(ConfigError::Validation(_)));
    }

    #[test]
    fn invalid_shards_and_threshold_are_reported() {
        let config = MediatorConfig {
            plan_cache_shards: Some(3),
            slow_dispatch_threshold_ms: Some(0),
            ..MediatorConfig::default()
        };
        let errors = config.validation_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field(), "plan_cache_shards");
        assert_matches!(config.validate(), Err(ConfigError::Validation(_)));
    }
}
