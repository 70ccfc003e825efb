//! Normalization schema and normalized payloads

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::model::EntityType;

/// Shape a relation field embeds in a nested payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    /// An array of records of the given entity
    Many(EntityType),
}

impl SchemaNode {
    pub fn entity(&self) -> &EntityType {
        match self {
            SchemaNode::Many(entity) => entity,
        }
    }
}

/// Normalization schema built up from relation declarations
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<String, EntityType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a many-cardinality embedding of `related`
    pub fn many(&mut self, related: &EntityType) -> SchemaNode {
        self.entities
            .entry(related.name().to_string())
            .or_insert_with(|| related.clone());
        SchemaNode::Many(related.clone())
    }

    /// Check if an entity has been embedded by any declaration
    pub fn is_declared(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }
}

/// Raw records of one entity, keyed by identifier, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct EntityBucket {
    order: Vec<String>,
    records: HashMap<String, Map<String, Value>>,
}

impl EntityBucket {
    pub fn get(&self, index: &str) -> Option<&Map<String, Value>> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate raw records in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Map<String, Value>)> {
        self.order
            .iter()
            .filter_map(|index| self.records.get(index).map(|raw| (index.as_str(), raw)))
    }
}

/// Flat payload: entity name -> identifier -> partially built raw record
#[derive(Debug, Clone, Default)]
pub struct NormalizedData {
    entities: HashMap<String, EntityBucket>,
}

impl NormalizedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// String form of an identifier used to index raw records
    pub fn index_of(id: &Value) -> Option<String> {
        match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Insert a raw record. A record seen twice is merged, later fields winning.
    pub fn insert(&mut self, entity: &str, index: String, raw: Map<String, Value>) {
        let bucket = self.entities.entry(entity.to_string()).or_default();
        match bucket.records.get_mut(&index) {
            Some(existing) => existing.extend(raw),
            None => {
                bucket.order.push(index.clone());
                bucket.records.insert(index, raw);
            }
        }
    }

    pub fn get(&self, entity: &str, index: &str) -> Option<&Map<String, Value>> {
        self.entities.get(entity)?.get(index)
    }

    pub fn get_mut(&mut self, entity: &str, index: &str) -> Option<&mut Map<String, Value>> {
        self.entities.get_mut(entity)?.records.get_mut(index)
    }

    pub fn entity(&self, entity: &str) -> Option<&EntityBucket> {
        self.entities.get(entity)
    }

    /// Iterate over every entity bucket
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityBucket)> {
        self.entities
            .iter()
            .map(|(name, bucket)| (name.as_str(), bucket))
    }

    /// Total number of raw records across all entities
    pub fn len(&self) -> usize {
        self.entities.values().map(EntityBucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
