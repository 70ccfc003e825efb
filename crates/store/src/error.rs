//! Error types for the store
//!
//! Only relation declaration and record construction can fail. Loading and
//! attaching relations degrade to empty sequences or no-ops instead.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error types for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Relation or entity declaration is inconsistent with the registry
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A raw value could not be turned into a record
    #[error("Invalid record for entity '{entity}': {message}")]
    InvalidRecord { entity: String, message: String },

    /// Store configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StoreError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        StoreError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_record(entity: &str, message: impl Into<String>) -> Self {
        StoreError::InvalidRecord {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if this error was raised while declaring entities or relations
    pub fn is_configuration(&self) -> bool {
        matches!(self, StoreError::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = StoreError::configuration("unknown entity 'comments'");
        assert_eq!(err.to_string(), "Configuration error: unknown entity 'comments'");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_record_display() {
        let err = StoreError::invalid_record("users", "missing primary key 'id'");
        assert_eq!(
            err.to_string(),
            "Invalid record for entity 'users': missing primary key 'id'"
        );
        assert!(!err.is_configuration());
    }
}
