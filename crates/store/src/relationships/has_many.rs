//! HasMany Relationship - one-to-many join on a single foreign key

use serde_json::Value;

use super::keys::{extract_keys, group_by_key};
use super::relation::{assign_groups, make_many};
use crate::error::StoreResult;
use crate::model::EntityType;
use crate::query::Query;
use crate::registry::ModelRegistry;
use crate::record::Record;
use crate::schema::{NormalizedData, Schema, SchemaNode};

/// HasMany relationship - each owner has many related records whose
/// `foreign_key` equals the owner's `local_key`
#[derive(Debug, Clone)]
pub struct HasMany {
    related: EntityType,
    foreign_key: String,
    local_key: String,
}

impl HasMany {
    /// Create a new HasMany relationship, resolving `related` through the registry
    pub fn new(
        registry: &ModelRegistry,
        related: &str,
        foreign_key: &str,
        local_key: &str,
    ) -> StoreResult<Self> {
        Ok(Self {
            related: registry.resolve(related)?,
            foreign_key: foreign_key.to_string(),
            local_key: local_key.to_string(),
        })
    }

    pub fn related(&self) -> &EntityType {
        &self.related
    }

    /// Field on related records referencing the owner
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    /// Field on owner records used as the join target
    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn define(&self, schema: &mut Schema) -> SchemaNode {
        schema.many(&self.related)
    }

    /// Set the foreign key on every related raw record referenced by `key`
    /// that does not carry one yet.
    pub fn attach(&self, key: &Value, record: &Record, data: &mut NormalizedData) {
        let Value::Array(indices) = key else {
            tracing::debug!(
                "Ignoring non-array key for {} relation: {}",
                self.related,
                key
            );
            return;
        };

        for index in indices {
            let Some(index) = NormalizedData::index_of(index) else {
                continue;
            };
            let Some(related) = data.get_mut(self.related.name(), &index) else {
                continue;
            };
            if related.contains_key(&self.foreign_key) {
                continue;
            }

            related.insert(self.foreign_key.clone(), record.id().clone());
            tracing::trace!(
                "Attached {}.{} = {} on {} {}",
                self.related,
                self.foreign_key,
                record.id(),
                self.related,
                index
            );
        }
    }

    pub fn make(&self, value: &Value) -> Vec<Record> {
        make_many(value, &self.related)
    }

    /// Load related records for every owner in `collection` onto `field`
    pub fn load(&self, query: &Query<'_>, collection: &mut [Record], field: &str, lazy: bool) {
        let mut related_query = query.relation_query(&self.related, field);
        related_query.where_in(&self.foreign_key, extract_keys(collection, &self.local_key));

        let candidates = related_query.get();
        let candidate_count = candidates.len();
        let groups = group_by_key(candidates, &self.foreign_key);

        assign_groups(collection, groups, &self.local_key, field, lazy);

        tracing::debug!(
            "Loaded has-many '{}' ({}) for {} owners: {} candidates, lazy={}",
            field,
            self.related,
            collection.len(),
            candidate_count,
            lazy
        );
    }
}
