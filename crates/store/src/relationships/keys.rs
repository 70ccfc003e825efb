//! Key extraction and grouping over record collections

use std::collections::{BTreeSet, HashMap};

use crate::record::{KeyValue, Record};

/// Mapping from a join key to the records sharing it, in original relative order
#[derive(Debug, Clone, Default)]
pub struct KeyGroupIndex {
    groups: HashMap<KeyValue, Vec<Record>>,
}

impl KeyGroupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records grouped under `key`, if any
    pub fn get(&self, key: &KeyValue) -> Option<&[Record]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Detached copies of the records grouped under `key`, or an empty sequence.
    ///
    /// Every call hands out fresh relation handles, so owners sharing a
    /// related record never share its nested relations.
    pub fn group(&self, key: Option<&KeyValue>) -> Vec<Record> {
        key.and_then(|key| self.get(key))
            .map(|records| records.iter().map(Record::detach).collect())
            .unwrap_or_default()
    }

    /// Append records onto the group for `key`
    pub fn extend(&mut self, key: KeyValue, records: impl IntoIterator<Item = Record>) {
        self.groups.entry(key).or_default().extend(records);
    }

    pub fn contains(&self, key: &KeyValue) -> bool {
        self.groups.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of grouped records
    pub fn record_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Distinct values of `key` across `collection`, used to narrow a follow-up query
pub fn extract_keys(collection: &[Record], key: &str) -> BTreeSet<KeyValue> {
    collection.iter().filter_map(|record| record.key(key)).collect()
}

/// Group `collection` by the value of `key`.
///
/// Records without a scalar value for `key` belong to no group.
pub fn group_by_key(collection: Vec<Record>, key: &str) -> KeyGroupIndex {
    let mut index = KeyGroupIndex::new();
    for record in collection {
        if let Some(value) = record.key(key) {
            index.extend(value, Some(record));
        }
    }
    index
}
