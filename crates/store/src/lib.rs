//! # elif-store: In-memory entity store for elif.rs
//!
//! Registers entity types and their has-many / has-many-through relations,
//! normalizes nested payloads into flat per-entity records, and loads
//! relations onto query results either materialized or as lazy handles.

pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod query;
pub mod record;
pub mod registry;
pub mod relationships;
pub mod schema;
pub mod store;

// Re-export core types
pub use config::{ConfigError, ConfigSource, StoreConfig, StoreConfigTrait};
pub use error::{StoreError, StoreResult};
pub use model::EntityType;
pub use normalize::Normalizer;
pub use query::{Constraint, EagerLoad, Query, WhereClause};
pub use record::{Collection, KeyValue, Record, Related};
pub use registry::ModelRegistry;
pub use relationships::{
    extract_keys, group_by_key, HasMany, HasManyThrough, KeyGroupIndex, LazyCollection, Relation,
};
pub use schema::{EntityBucket, NormalizedData, Schema, SchemaNode};
pub use store::Store;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
