//! HasManyThrough Relationship - many-to-many join through a pivot entity

use serde_json::Value;

use super::keys::{extract_keys, group_by_key, KeyGroupIndex};
use super::relation::{assign_groups, make_many};
use crate::error::StoreResult;
use crate::model::EntityType;
use crate::query::Query;
use crate::registry::ModelRegistry;
use crate::record::Record;
use crate::schema::{NormalizedData, Schema, SchemaNode};

/// HasManyThrough relationship.
///
/// Owner `local_key` is referenced by pivot `first_key`; pivot
/// `second_local_key` references related `second_key`.
#[derive(Debug, Clone)]
pub struct HasManyThrough {
    related: EntityType,
    through: EntityType,
    first_key: String,
    second_key: String,
    local_key: String,
    second_local_key: String,
}

impl HasManyThrough {
    /// Create a new HasManyThrough relationship, resolving `related` and
    /// `through` through the registry
    pub fn new(
        registry: &ModelRegistry,
        related: &str,
        through: &str,
        first_key: &str,
        second_key: &str,
        local_key: &str,
        second_local_key: &str,
    ) -> StoreResult<Self> {
        Ok(Self {
            related: registry.resolve(related)?,
            through: registry.resolve(through)?,
            first_key: first_key.to_string(),
            second_key: second_key.to_string(),
            local_key: local_key.to_string(),
            second_local_key: second_local_key.to_string(),
        })
    }

    pub fn related(&self) -> &EntityType {
        &self.related
    }

    /// The pivot entity
    pub fn through(&self) -> &EntityType {
        &self.through
    }

    pub fn first_key(&self) -> &str {
        &self.first_key
    }

    pub fn second_key(&self) -> &str {
        &self.second_key
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn second_local_key(&self) -> &str {
        &self.second_local_key
    }

    /// The pivot does not appear in the embedded shape
    pub fn define(&self, schema: &mut Schema) -> SchemaNode {
        schema.many(&self.related)
    }

    /// Through relations hold no foreign key, so there is nothing to backfill.
    pub fn attach(&self, _key: &Value, _record: &Record, _data: &mut NormalizedData) {}

    pub fn make(&self, value: &Value) -> Vec<Record> {
        make_many(value, &self.related)
    }

    /// Load related records for every owner in `collection` onto `field`
    pub fn load(&self, query: &Query<'_>, collection: &mut [Record], field: &str, lazy: bool) {
        let mut related_query = query.relation_query(&self.related, field);

        let mut through_query = query.new_query(&self.through);
        through_query.where_in(&self.first_key, extract_keys(collection, &self.local_key));
        let throughs = through_query.get();

        related_query.where_in(
            &self.second_key,
            extract_keys(&throughs, &self.second_local_key),
        );
        let related = related_query.get();
        let related_count = related.len();
        let related_by_key = group_by_key(related, &self.second_key);

        let groups = self.map_through_relations(&throughs, &related_by_key);

        assign_groups(collection, groups, &self.local_key, field, lazy);

        tracing::debug!(
            "Loaded has-many-through '{}' ({} via {}): {} owners, {} pivots, {} related, lazy={}",
            field,
            self.related,
            self.through,
            collection.len(),
            throughs.len(),
            related_count,
            lazy
        );
    }

    /// Concatenate related groups across pivot rows sharing the same owner key,
    /// in pivot order and without deduplication.
    fn map_through_relations(
        &self,
        throughs: &[Record],
        related_by_key: &KeyGroupIndex,
    ) -> KeyGroupIndex {
        let mut groups = KeyGroupIndex::new();
        for through in throughs {
            let Some(owner_key) = through.key(&self.first_key) else {
                continue;
            };
            let related = related_by_key.group(through.key(&self.second_local_key).as_ref());
            groups.extend(owner_key, related);
        }
        groups
    }
}
