//! Query - filtered reads over a store with relation eager loading
//!
//! A query narrows one entity's collection with `where_in` / `where_eq`
//! constraints and, on `get`, loads every relation requested with `with`.
//! Relations build their own narrowed queries through [`Query::relation_query`].

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::model::EntityType;
use crate::record::{Collection, KeyValue, Record};
use crate::store::Store;

/// Callback applied to the narrowed query of an eager-loaded relation
pub type Constraint = Arc<dyn Fn(&mut Query<'_>) + Send + Sync>;

/// Filter applied to candidate records
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    /// Field value is one of the given keys
    In { field: String, keys: BTreeSet<KeyValue> },
    /// Field value equals the given value exactly
    Eq { field: String, value: Value },
}

impl WhereClause {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            WhereClause::In { field, keys } => record
                .key(field)
                .map_or(false, |key| keys.contains(&key)),
            WhereClause::Eq { field, value } => record.get(field) == Some(value),
        }
    }
}

/// A relation requested for eager loading, with its nested loads
#[derive(Clone)]
pub struct EagerLoad {
    relation: String,
    constraints: Vec<Constraint>,
    nested: Vec<EagerLoad>,
}

impl EagerLoad {
    fn new(relation: &str) -> Self {
        Self {
            relation: relation.to_string(),
            constraints: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn nested(&self) -> &[EagerLoad] {
        &self.nested
    }

    /// Find or create the load for a dot-separated path below `loads`
    fn resolve_path<'a>(loads: &'a mut Vec<EagerLoad>, path: &str) -> Option<&'a mut EagerLoad> {
        let mut segments = path.split('.').filter(|segment| !segment.is_empty());
        let first = segments.next()?;

        let mut current = Self::entry(loads, first);
        for segment in segments {
            current = Self::entry(&mut current.nested, segment);
        }
        Some(current)
    }

    fn entry<'a>(loads: &'a mut Vec<EagerLoad>, relation: &str) -> &'a mut EagerLoad {
        let position = match loads.iter().position(|load| load.relation == relation) {
            Some(position) => position,
            None => {
                loads.push(EagerLoad::new(relation));
                loads.len() - 1
            }
        };
        &mut loads[position]
    }
}

impl fmt::Debug for EagerLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoad")
            .field("relation", &self.relation)
            .field("constraints", &self.constraints.len())
            .field("nested", &self.nested)
            .finish()
    }
}

/// Query over one entity of a [`Store`]
#[derive(Clone)]
pub struct Query<'s> {
    store: &'s Store,
    entity: EntityType,
    wheres: Vec<WhereClause>,
    eager: Vec<EagerLoad>,
    lazy: Option<bool>,
}

impl<'s> Query<'s> {
    /// Create a new query for `entity`
    pub fn new(store: &'s Store, entity: EntityType) -> Self {
        Self {
            store,
            entity,
            wheres: Vec::new(),
            eager: Vec::new(),
            lazy: None,
        }
    }

    /// Create an unconstrained query for another entity of the same store
    pub fn new_query(&self, entity: &EntityType) -> Query<'s> {
        Query::new(self.store, entity.clone())
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    pub fn eager_loads(&self) -> &[EagerLoad] {
        &self.eager
    }

    /// Keep only records whose `field` is one of `keys`
    pub fn where_in(&mut self, field: &str, keys: impl IntoIterator<Item = KeyValue>) -> &mut Self {
        self.wheres.push(WhereClause::In {
            field: field.to_string(),
            keys: keys.into_iter().collect(),
        });
        self
    }

    /// Keep only records whose `field` equals `value`
    pub fn where_eq(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.wheres.push(WhereClause::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    /// Eager load a relation. Nested relations are separated by dots,
    /// e.g. `"posts.comments"`.
    pub fn with(&mut self, path: &str) -> &mut Self {
        EagerLoad::resolve_path(&mut self.eager, path);
        self
    }

    /// Eager load a relation and constrain the query that fetches it
    pub fn with_constraint<F>(&mut self, path: &str, constraint: F) -> &mut Self
    where
        F: Fn(&mut Query<'_>) + Send + Sync + 'static,
    {
        if let Some(load) = EagerLoad::resolve_path(&mut self.eager, path) {
            load.constraints.push(Arc::new(constraint));
        }
        self
    }

    /// Choose between materialized and lazy relation fields.
    /// Defaults to the store's `lazy_relations` setting.
    pub fn lazy(&mut self, lazy: bool) -> &mut Self {
        self.lazy = Some(lazy);
        self
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
            .unwrap_or_else(|| self.store.config().lazy_relations)
    }

    /// Build the narrowed query a relation uses to fetch `related` for `field`.
    ///
    /// The new query carries the nested loads and constraints requested for
    /// `field` on this query, and inherits its lazy flag.
    pub fn relation_query(&self, related: &EntityType, field: &str) -> Query<'s> {
        let mut query = self.new_query(related);
        query.lazy = self.lazy;

        if let Some(load) = self.eager.iter().find(|load| load.relation == field) {
            query.eager = load.nested.clone();
            for constraint in &load.constraints {
                constraint(&mut query);
            }
        }

        query
    }

    fn matches(&self, record: &Record) -> bool {
        self.wheres.iter().all(|clause| clause.matches(record))
    }

    /// Execute the query and load requested relations on the result
    pub fn get(&self) -> Collection {
        let mut records = self
            .store
            .select(self.entity.name(), |record| self.matches(record));

        let lazy = self.is_lazy();
        for load in &self.eager {
            match self.store.registry().relation(self.entity.name(), &load.relation) {
                Some(relation) => relation.load(self, &mut records, &load.relation, lazy),
                None => tracing::warn!(
                    "Relation '{}' is not defined on entity '{}'",
                    load.relation,
                    self.entity
                ),
            }
        }

        records
    }

    /// Execute the query and return the first matching record
    pub fn first(&self) -> Option<Record> {
        self.get().into_iter().next()
    }
}

impl fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &self.entity)
            .field("wheres", &self.wheres)
            .field("eager", &self.eager)
            .field("lazy", &self.lazy)
            .finish()
    }
}
