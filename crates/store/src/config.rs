//! Store configuration
//!
//! Loaded from environment variables or a YAML document. Values that are not
//! provided fall back to the defaults of [`StoreConfig::new`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Runtime configuration for a [`Store`](crate::store::Store)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Default `lazy` flag used when a query loads relations
    pub lazy_relations: bool,
    /// Identifier field used for entities registered without an explicit one
    pub primary_key: String,
    pub log_level: String,
}

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value loaded from environment variable
    EnvVar(String),
    /// Default value used
    Default(String),
}

/// Configuration trait for store configuration
pub trait StoreConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

const LAZY_RELATIONS_VAR: &str = "ELIF_STORE_LAZY_RELATIONS";
const PRIMARY_KEY_VAR: &str = "ELIF_STORE_PRIMARY_KEY";
const LOG_LEVEL_VAR: &str = "ELIF_STORE_LOG_LEVEL";

impl StoreConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            lazy_relations: false,
            primary_key: "id".to_string(),
            log_level: "info".to_string(),
        }
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}

impl StoreConfigTrait for StoreConfig {
    /// Load configuration from `ELIF_STORE_*` environment variables
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(lazy) = env::var(LAZY_RELATIONS_VAR) {
            config.lazy_relations = parse_bool("lazy_relations", &lazy)?;
        }

        if let Ok(primary_key) = env::var(PRIMARY_KEY_VAR) {
            config.primary_key = primary_key;
        }

        if let Ok(log_level) = env::var(LOG_LEVEL_VAR) {
            config.log_level = log_level.to_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "primary_key".to_string(),
                value: self.primary_key.clone(),
                expected: "a non-empty field name".to_string(),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                value: self.log_level.clone(),
                expected: format!("one of: {}", VALID_LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let defaults = Self::new();
        [
            ("lazy_relations", LAZY_RELATIONS_VAR, defaults.lazy_relations.to_string()),
            ("primary_key", PRIMARY_KEY_VAR, defaults.primary_key),
            ("log_level", LOG_LEVEL_VAR, defaults.log_level),
        ]
        .into_iter()
        .map(|(field, var, default)| {
            let source = if env::var(var).is_ok() {
                ConfigSource::EnvVar(var.to_string())
            } else {
                ConfigSource::Default(default)
            };
            (field.to_string(), source)
        })
        .collect()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "true or false".to_string(),
        }),
    }
}
