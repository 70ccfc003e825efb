//! Model Registry - entity and relation declarations shared by a store
//!
//! Entity references are resolved against the registry once, when a relation
//! is constructed. Loading never looks entity names up again.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::model::EntityType;
use crate::relationships::Relation;

/// Thread-safe registry of entity types and their declared relations
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    /// Entity name -> entity type
    entities: Arc<DashMap<String, EntityType>>,

    /// Owner entity name -> (field, relation) in declaration order
    relations: Arc<DashMap<String, Vec<(String, Arc<Relation>)>>>,
}

impl ModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type.
    ///
    /// Registering the same entity twice is allowed as long as the primary
    /// key agrees.
    pub fn register(&self, entity: EntityType) -> StoreResult<EntityType> {
        match self.entities.entry(entity.name().to_string()) {
            Entry::Occupied(existing) => {
                let existing = existing.get();
                if existing.primary_key() != entity.primary_key() {
                    return Err(StoreError::configuration(format!(
                        "entity '{}' is already registered with primary key '{}'",
                        entity.name(),
                        existing.primary_key()
                    )));
                }
                Ok(existing.clone())
            }
            Entry::Vacant(slot) => {
                slot.insert(entity.clone());
                Ok(entity)
            }
        }
    }

    /// Resolve an entity name to its registered type
    pub fn resolve(&self, name: &str) -> StoreResult<EntityType> {
        self.entities
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                StoreError::configuration(format!("entity '{}' is not registered", name))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Declare `field` on `owner` as a relation. Redeclaring a field replaces it.
    pub fn define_relation(
        &self,
        owner: &str,
        field: &str,
        relation: impl Into<Relation>,
    ) -> StoreResult<()> {
        let owner_type = self.resolve(owner)?;
        if owner_type.primary_key() == field {
            return Err(StoreError::configuration(format!(
                "relation field '{}' on '{}' collides with its primary key",
                field, owner
            )));
        }

        let relation = Arc::new(relation.into());
        let mut fields = self.relations.entry(owner.to_string()).or_default();
        match fields.iter().position(|(name, _)| name == field) {
            Some(index) => fields[index].1 = relation,
            None => fields.push((field.to_string(), relation)),
        }

        Ok(())
    }

    /// Get the relation declared on `owner` under `field`
    pub fn relation(&self, owner: &str, field: &str) -> Option<Arc<Relation>> {
        self.relations.get(owner).and_then(|fields| {
            fields
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, relation)| Arc::clone(relation))
        })
    }

    /// All relations declared on `owner`, in declaration order
    pub fn relations(&self, owner: &str) -> Vec<(String, Arc<Relation>)> {
        self.relations
            .get(owner)
            .map(|fields| fields.value().clone())
            .unwrap_or_default()
    }

    /// Names of all registered entities, sorted
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
