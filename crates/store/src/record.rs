//! Records, join keys and relation field values

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::relationships::lazy::LazyCollection;

/// Ordered sequence of records of one entity type
pub type Collection = Vec<Record>;

/// Hashable form of a scalar field value used to join records.
///
/// Keys compare by exact stored representation: `1`, `1.0` and `"1"` are
/// three different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Raw bits of a floating point value
    Float(u64),
    Str(String),
}

impl KeyValue {
    /// Convert a field value into a join key. `null`, arrays and objects are not keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(KeyValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(KeyValue::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(KeyValue::UInt(u))
                } else {
                    n.as_f64().map(|f| KeyValue::Float(f.to_bits()))
                }
            }
            Value::String(s) => Some(KeyValue::Str(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Convert the key back into a field value
    pub fn to_value(&self) -> Value {
        match self {
            KeyValue::Bool(b) => Value::Bool(*b),
            KeyValue::Int(i) => Value::from(*i),
            KeyValue::UInt(u) => Value::from(*u),
            KeyValue::Float(bits) => Value::from(f64::from_bits(*bits)),
            KeyValue::Str(s) => Value::String(s.clone()),
        }
    }

    /// Returns true if the given field value is exactly this key
    pub fn matches(&self, value: &Value) -> bool {
        KeyValue::from_value(value).as_ref() == Some(self)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Bool(b) => write!(f, "{}", b),
            KeyValue::Int(i) => write!(f, "{}", i),
            KeyValue::UInt(u) => write!(f, "{}", u),
            KeyValue::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Str(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Str(value)
    }
}

/// Value held by a relation field on an owner record
#[derive(Debug, Clone)]
pub enum Related {
    /// Fully materialized related records
    Loaded(Vec<Record>),
    /// Related records resolved on first access
    Lazy(LazyCollection),
}

impl Related {
    /// Run `f` over the related records, resolving a lazy handle first
    pub fn with<R>(&self, f: impl FnOnce(&[Record]) -> R) -> R {
        match self {
            Related::Loaded(records) => f(records),
            Related::Lazy(handle) => f(&handle.read()),
        }
    }

    /// Run `f` over the related records mutably, resolving a lazy handle first
    pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut Vec<Record>) -> R) -> R {
        match self {
            Related::Loaded(records) => f(records),
            Related::Lazy(handle) => f(&mut handle.write()),
        }
    }

    pub fn to_vec(&self) -> Vec<Record> {
        self.with(<[Record]>::to_vec)
    }

    pub fn len(&self) -> usize {
        self.with(<[Record]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns false only for a lazy handle that has not been accessed yet
    pub fn is_resolved(&self) -> bool {
        match self {
            Related::Loaded(_) => true,
            Related::Lazy(handle) => handle.is_resolved(),
        }
    }

    /// Deep copy that shares no lazy handle with `self`
    pub fn detach(&self) -> Related {
        match self {
            Related::Loaded(records) => {
                Related::Loaded(records.iter().map(Record::detach).collect())
            }
            Related::Lazy(handle) => Related::Lazy(handle.fork()),
        }
    }

    /// Identifiers of the related records, in order
    pub fn ids(&self) -> Vec<Value> {
        self.with(|records| records.iter().map(|r| r.id().clone()).collect())
    }
}

/// A single entity record: scalar fields plus loaded relation fields.
///
/// A record always carries its identifier.
#[derive(Debug, Clone)]
pub struct Record {
    id: Value,
    fields: Map<String, Value>,
    relations: BTreeMap<String, Related>,
}

impl Record {
    /// Build a record from raw fields. Returns `None` when the primary key is missing or null.
    pub fn new(primary_key: &str, fields: Map<String, Value>) -> Option<Self> {
        let id = fields.get(primary_key).filter(|id| !id.is_null())?.clone();
        Some(Self {
            id,
            fields,
            relations: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Join key of a field, if the field holds a scalar value
    pub fn key(&self, field: &str) -> Option<KeyValue> {
        self.fields.get(field).and_then(KeyValue::from_value)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn relation(&self, field: &str) -> Option<&Related> {
        self.relations.get(field)
    }

    pub fn relation_mut(&mut self, field: &str) -> Option<&mut Related> {
        self.relations.get_mut(field)
    }

    pub fn set_relation(&mut self, field: impl Into<String>, related: Related) {
        self.relations.insert(field.into(), related);
    }

    /// Copy of this record whose relation fields are independent of the
    /// original's. A plain `clone` shares lazy handles instead.
    pub fn detach(&self) -> Record {
        Record {
            id: self.id.clone(),
            fields: self.fields.clone(),
            relations: self
                .relations
                .iter()
                .map(|(field, related)| (field.clone(), related.detach()))
                .collect(),
        }
    }

    pub fn has_relation(&self, field: &str) -> bool {
        self.relations.contains_key(field)
    }

    /// Render the record as JSON, resolving every relation field
    pub fn to_json(&self) -> Value {
        let mut object = self.fields.clone();
        for (field, related) in &self.relations {
            let items = related.with(|records| records.iter().map(Record::to_json).collect());
            object.insert(field.clone(), Value::Array(items));
        }
        Value::Object(object)
    }
}
