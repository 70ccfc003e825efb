//! Relationships Module - relation descriptors and their loading machinery

pub mod has_many;
pub mod has_many_through;
pub mod keys;
pub mod lazy;
pub mod relation;

// Re-export main types
pub use has_many::HasMany;
pub use has_many_through::HasManyThrough;
pub use keys::{extract_keys, group_by_key, KeyGroupIndex};
pub use lazy::LazyCollection;
pub use relation::Relation;
