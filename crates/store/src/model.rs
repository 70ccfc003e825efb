//! Entity types
//!
//! An [`EntityType`] is the resolved handle for a registered entity: its name
//! and the field that identifies its records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{StoreError, StoreResult};
use crate::record::Record;

/// Registered entity handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    name: String,
    primary_key: String,
}

impl EntityType {
    /// Create an entity type identified by `id`
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_primary_key(name, "id")
    }

    pub fn with_primary_key(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
        }
    }

    /// Entity name (the collection records of this type live in)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Build a record of this type from a raw JSON object
    pub fn record(&self, raw: &Value) -> StoreResult<Record> {
        let Value::Object(fields) = raw else {
            return Err(StoreError::invalid_record(&self.name, "expected a JSON object"));
        };

        Record::new(&self.primary_key, fields.clone()).ok_or_else(|| {
            StoreError::invalid_record(
                &self.name,
                format!("missing primary key '{}'", self.primary_key),
            )
        })
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
