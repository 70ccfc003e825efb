//! Store - in-memory, per-entity record collections
//!
//! The store owns the model registry and the configuration, and is the
//! backing collection for every [`Query`].

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::model::EntityType;
use crate::normalize::Normalizer;
use crate::query::Query;
use crate::record::{Collection, Record, Related};
use crate::registry::ModelRegistry;
use crate::relationships::Relation;

/// In-memory entity store
#[derive(Debug, Default)]
pub struct Store {
    config: StoreConfig,
    registry: ModelRegistry,
    entities: DashMap<String, Vec<Record>>,
}

impl Store {
    /// Create a new store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a new store with custom configuration
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            registry: ModelRegistry::new(),
            entities: DashMap::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Register an entity identified by the configured primary key
    pub fn register(&self, name: &str) -> StoreResult<EntityType> {
        self.register_entity(EntityType::with_primary_key(
            name,
            self.config.primary_key.as_str(),
        ))
    }

    /// Register an entity with an explicit primary key
    pub fn register_entity(&self, entity: EntityType) -> StoreResult<EntityType> {
        self.registry.register(entity)
    }

    /// Declare a relation field on a registered entity
    pub fn define_relation(
        &self,
        owner: &str,
        field: &str,
        relation: impl Into<Relation>,
    ) -> StoreResult<()> {
        self.registry.define_relation(owner, field, relation)
    }

    /// Start a query over a registered entity
    pub fn query(&self, entity: &str) -> StoreResult<Query<'_>> {
        Ok(Query::new(self, self.registry.resolve(entity)?))
    }

    /// Normalize a nested payload and write every record it contains.
    ///
    /// Returns the number of records written across all entities.
    pub fn insert(&self, entity: &str, payload: &Value) -> StoreResult<usize> {
        let entity = self.registry.resolve(entity)?;
        let data = Normalizer::new(&self.registry).normalize(&entity, payload);

        let mut written = 0;
        for (name, bucket) in data.iter() {
            let entity = self.registry.resolve(name)?;
            let relation_fields: HashSet<String> = self
                .registry
                .relations(name)
                .into_iter()
                .map(|(field, _)| field)
                .collect();

            let records = bucket
                .iter()
                .filter_map(|(_, raw)| {
                    let mut fields = raw.clone();
                    fields.retain(|field, _| !relation_fields.contains(field));
                    Record::new(entity.primary_key(), fields)
                })
                .collect();

            written += self.insert_records(name, records);
        }

        tracing::debug!("Inserted {} records from {} payload", written, entity);
        Ok(written)
    }

    /// Write records into an entity collection, replacing records with the same identifier
    pub fn insert_records(&self, entity: &str, records: Vec<Record>) -> usize {
        let count = records.len();
        let mut rows = self.entities.entry(entity.to_string()).or_default();
        for record in records {
            match rows.iter().position(|row| row.id() == record.id()) {
                Some(position) => rows[position] = record,
                None => rows.push(record),
            }
        }
        count
    }

    /// Build a record of `entity` from a raw value, turning nested relation
    /// fields into related records
    pub fn make(&self, entity: &str, raw: &Value) -> StoreResult<Record> {
        let entity = self.registry.resolve(entity)?;
        let Value::Object(object) = raw else {
            return Err(StoreError::invalid_record(entity.name(), "expected a JSON object"));
        };

        let mut fields = object.clone();
        let mut related = Vec::new();
        for (field, relation) in self.registry.relations(entity.name()) {
            if let Some(value) = fields.remove(&field) {
                related.push((field, relation.make(&value)));
            }
        }

        let mut record = Record::new(entity.primary_key(), fields).ok_or_else(|| {
            StoreError::invalid_record(
                entity.name(),
                format!("missing primary key '{}'", entity.primary_key()),
            )
        })?;
        for (field, records) in related {
            record.set_relation(field, Related::Loaded(records));
        }

        Ok(record)
    }

    /// Records of `entity` matching `predicate`, in insertion order
    pub fn select<F>(&self, entity: &str, predicate: F) -> Collection
    where
        F: Fn(&Record) -> bool,
    {
        self.entities
            .get(entity)
            .map(|rows| rows.iter().filter(|row| predicate(row)).cloned().collect())
            .unwrap_or_default()
    }

    /// All records of `entity`
    pub fn all(&self, entity: &str) -> Collection {
        self.select(entity, |_| true)
    }

    /// Find a record by identifier
    pub fn find(&self, entity: &str, id: &Value) -> Option<Record> {
        self.select(entity, |record| record.id() == id).into_iter().next()
    }

    pub fn count(&self, entity: &str) -> usize {
        self.entities.get(entity).map_or(0, |rows| rows.len())
    }

    /// Remove a record by identifier
    pub fn delete(&self, entity: &str, id: &Value) -> bool {
        match self.entities.get_mut(entity) {
            Some(mut rows) => {
                let before = rows.len();
                rows.retain(|row| row.id() != id);
                rows.len() != before
            }
            None => false,
        }
    }
}
