//! Relation - the closed set of relation descriptors
//!
//! Every relation supports the same four operations:
//!
//! - `define` declares the embedded shape to the normalization schema
//! - `attach` backfills foreign keys while a payload is being normalized
//! - `make` builds related records from a raw nested value
//! - `load` resolves related records for a batch of owners
//!
//! The helpers at the bottom of this module are shared by every variant.

use serde_json::Value;
use std::sync::Arc;

use super::has_many::HasMany;
use super::has_many_through::HasManyThrough;
use super::keys::KeyGroupIndex;
use super::lazy::LazyCollection;
use crate::model::EntityType;
use crate::query::Query;
use crate::record::{Record, Related};
use crate::schema::{NormalizedData, Schema, SchemaNode};

/// A declared relationship between an owner entity and a related entity
#[derive(Debug, Clone)]
pub enum Relation {
    HasMany(HasMany),
    HasManyThrough(HasManyThrough),
}

impl Relation {
    /// The entity this relation loads
    pub fn related(&self) -> &EntityType {
        match self {
            Relation::HasMany(relation) => relation.related(),
            Relation::HasManyThrough(relation) => relation.related(),
        }
    }

    /// Declare the embedded shape of this relation to `schema`
    pub fn define(&self, schema: &mut Schema) -> SchemaNode {
        match self {
            Relation::HasMany(relation) => relation.define(schema),
            Relation::HasManyThrough(relation) => relation.define(schema),
        }
    }

    /// Backfill foreign keys on related raw records referenced by `key`
    pub fn attach(&self, key: &Value, record: &Record, data: &mut NormalizedData) {
        match self {
            Relation::HasMany(relation) => relation.attach(key, record, data),
            Relation::HasManyThrough(relation) => relation.attach(key, record, data),
        }
    }

    /// Build related records from a raw nested value
    pub fn make(&self, value: &Value) -> Vec<Record> {
        match self {
            Relation::HasMany(relation) => relation.make(value),
            Relation::HasManyThrough(relation) => relation.make(value),
        }
    }

    /// Load this relation onto `field` of every record in `collection`
    pub fn load(&self, query: &Query<'_>, collection: &mut [Record], field: &str, lazy: bool) {
        match self {
            Relation::HasMany(relation) => relation.load(query, collection, field, lazy),
            Relation::HasManyThrough(relation) => relation.load(query, collection, field, lazy),
        }
    }
}

impl From<HasMany> for Relation {
    fn from(relation: HasMany) -> Self {
        Relation::HasMany(relation)
    }
}

impl From<HasManyThrough> for Relation {
    fn from(relation: HasManyThrough) -> Self {
        Relation::HasManyThrough(relation)
    }
}

/// Build records of `related` from an array of raw values.
///
/// Anything that is not an array yields no records; elements that are not
/// objects or lack an identifier are skipped.
pub(crate) fn make_many(value: &Value, related: &EntityType) -> Vec<Record> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match related.record(item) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::debug!("Skipping nested {} value: {}", related, err);
                None
            }
        })
        .collect()
}

/// Assign each owner the group matching its `local_key`, either materialized
/// or behind a lazy handle. Owners without a group receive an empty sequence.
pub(crate) fn assign_groups(
    collection: &mut [Record],
    groups: KeyGroupIndex,
    local_key: &str,
    field: &str,
    lazy: bool,
) {
    if lazy {
        let groups = Arc::new(groups);
        for owner in collection.iter_mut() {
            let key = owner.key(local_key);
            let groups = Arc::clone(&groups);
            let handle = LazyCollection::new(move || groups.group(key.as_ref()));
            owner.set_relation(field, Related::Lazy(handle));
        }
    } else {
        for owner in collection.iter_mut() {
            let related = groups.group(owner.key(local_key).as_ref());
            owner.set_relation(field, Related::Loaded(related));
        }
    }
}
