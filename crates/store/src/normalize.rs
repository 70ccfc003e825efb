//! Normalizer - flattens nested payloads into per-entity raw records
//!
//! Each declared relation field is replaced by the identifiers of its nested
//! records, and the relation's `attach` runs for every owner so that nested
//! records pick up the foreign keys they were given implicitly by nesting.

use serde_json::Value;
use std::sync::Arc;

use crate::model::EntityType;
use crate::record::Record;
use crate::registry::ModelRegistry;
use crate::relationships::Relation;
use crate::schema::{NormalizedData, Schema, SchemaNode};

/// Normalizes nested payloads against the relations declared in a registry
#[derive(Debug)]
pub struct Normalizer<'r> {
    registry: &'r ModelRegistry,
    schema: Schema,
}

impl<'r> Normalizer<'r> {
    pub fn new(registry: &'r ModelRegistry) -> Self {
        Self {
            registry,
            schema: Schema::new(),
        }
    }

    /// Schema accumulated from the relations visited so far
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Normalize a single raw record or an array of raw records of `entity`
    pub fn normalize(&mut self, entity: &EntityType, payload: &Value) -> NormalizedData {
        let mut data = NormalizedData::new();
        match payload {
            Value::Array(items) => {
                for item in items {
                    self.visit(entity, item, &mut data);
                }
            }
            other => {
                self.visit(entity, other, &mut data);
            }
        }
        data
    }

    /// Normalize one raw value and return the identifier it is referenced by.
    ///
    /// Scalars are taken to be references to records normalized elsewhere.
    fn visit(
        &mut self,
        entity: &EntityType,
        raw: &Value,
        data: &mut NormalizedData,
    ) -> Option<Value> {
        let object = match raw {
            Value::Object(object) => object,
            Value::String(_) | Value::Number(_) => return Some(raw.clone()),
            _ => {
                tracing::debug!("Skipping non-object {} payload entry: {}", entity, raw);
                return None;
            }
        };

        let Some(id) = object.get(entity.primary_key()).filter(|id| !id.is_null()) else {
            tracing::debug!(
                "Skipping {} payload entry without '{}'",
                entity,
                entity.primary_key()
            );
            return None;
        };
        let id = id.clone();
        let index = NormalizedData::index_of(&id)?;

        let mut flat = object.clone();
        let mut pending: Vec<(Arc<Relation>, Value)> = Vec::new();

        for (field, relation) in self.registry.relations(entity.name()) {
            let Some(nested) = object.get(&field) else {
                continue;
            };

            let key = match relation.define(&mut self.schema) {
                SchemaNode::Many(related) => match nested {
                    Value::Array(items) => Value::Array(
                        items
                            .iter()
                            .filter_map(|item| self.visit(&related, item, data))
                            .collect(),
                    ),
                    other => other.clone(),
                },
            };

            flat.insert(field, key.clone());
            pending.push((relation, key));
        }

        let owner = Record::new(entity.primary_key(), flat.clone())?;
        data.insert(entity.name(), index, flat);

        for (relation, key) in pending {
            relation.attach(&key, &owner, data);
        }

        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::{HasMany, HasManyThrough};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        let registry = ModelRegistry::new();
        for entity in ["users", "posts", "comments", "roles", "role_user"] {
            registry.register(EntityType::new(entity)).unwrap();
        }
        registry
            .define_relation(
                "users",
                "posts",
                HasMany::new(&registry, "posts", "user_id", "id").unwrap(),
            )
            .unwrap();
        registry
            .define_relation(
                "posts",
                "comments",
                HasMany::new(&registry, "comments", "post_id", "id").unwrap(),
            )
            .unwrap();
        registry
            .define_relation(
                "users",
                "roles",
                HasManyThrough::new(
                    &registry,
                    "roles",
                    "role_user",
                    "user_id",
                    "id",
                    "id",
                    "role_id",
                )
                .unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_normalize_flattens_and_attaches_foreign_keys() {
        let registry = registry();
        let users = registry.resolve("users").unwrap();

        let data = Normalizer::new(&registry).normalize(
            &users,
            &json!({
                "id": 1,
                "name": "John",
                "posts": [
                    {"id": 10, "comments": [{"id": 100}, {"id": 101}]},
                    {"id": 11, "user_id": 7}
                ]
            }),
        );

        let user = data.get("users", "1").unwrap();
        assert_eq!(user.get("posts"), Some(&json!([10, 11])));

        assert_eq!(data.get("posts", "10").unwrap().get("user_id"), Some(&json!(1)));
        assert_eq!(data.get("posts", "11").unwrap().get("user_id"), Some(&json!(7)));
        assert_eq!(data.get("posts", "10").unwrap().get("comments"), Some(&json!([100, 101])));
        assert_eq!(data.get("comments", "100").unwrap().get("post_id"), Some(&json!(10)));
        assert_eq!(data.len(), 5);
    }

    #[test]
    fn test_normalize_array_payload() {
        let registry = registry();
        let users = registry.resolve("users").unwrap();

        let data = Normalizer::new(&registry).normalize(
            &users,
            &json!([{"id": 1}, {"id": 2}, "not a record", {"name": "no id"}]),
        );

        let order: Vec<&str> = data.entity("users").unwrap().iter().map(|(i, _)| i).collect();
        assert_eq!(order, vec!["1", "2"]);
    }

    #[test]
    fn test_first_owner_wins_for_shared_child() {
        let registry = registry();
        let users = registry.resolve("users").unwrap();

        let data = Normalizer::new(&registry).normalize(
            &users,
            &json!([
                {"id": 1, "posts": [{"id": 10}]},
                {"id": 2, "posts": [{"id": 10}]}
            ]),
        );

        assert_eq!(data.get("posts", "10").unwrap().get("user_id"), Some(&json!(1)));
    }

    #[test]
    fn test_through_relation_leaves_related_untouched() {
        let registry = registry();
        let users = registry.resolve("users").unwrap();

        let mut normalizer = Normalizer::new(&registry);
        let data = normalizer.normalize(&users, &json!({"id": 1, "roles": [{"id": 900}]}));

        let role = data.get("roles", "900").map(|raw| Value::Object(raw.clone()));
        assert_eq!(role, Some(json!({"id": 900})));
        assert!(data.entity("role_user").is_none());
        assert!(normalizer.schema().is_declared("roles"));
    }

    #[test]
    fn test_malformed_relation_value_is_kept_and_ignored() {
        let registry = registry();
        let users = registry.resolve("users").unwrap();

        let data = Normalizer::new(&registry).normalize(&users, &json!({"id": 1, "posts": 10}));

        assert_eq!(data.get("users", "1").unwrap().get("posts"), Some(&json!(10)));
        assert!(data.entity("posts").is_none());
    }

    #[test]
    fn test_scalar_references_are_kept() {
        let registry = registry();
        let users = registry.resolve("users").unwrap();

        let data =
            Normalizer::new(&registry).normalize(&users, &json!({"id": 1, "posts": [10, "11"]}));

        assert_eq!(data.get("users", "1").unwrap().get("posts"), Some(&json!([10, "11"])));
        assert!(data.entity("posts").is_none());
    }
}
