//! Lazy relation collections
//!
//! A [`LazyCollection`] defers materializing a relation group until the
//! first read or write. The resolver runs exactly once, even when several
//! threads race on the first access, and is dropped as soon as it has run.

use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::record::Record;

type Resolver = Box<dyn FnOnce() -> Vec<Record> + Send>;

struct LazyState {
    items: OnceCell<RwLock<Vec<Record>>>,
    resolver: Mutex<Option<Resolver>>,
}

/// Deferred handle to a relation group.
///
/// Clones share the same resolution state and backing sequence. Use
/// [`LazyCollection::fork`] for an independent handle.
#[derive(Clone)]
pub struct LazyCollection {
    state: Arc<LazyState>,
}

impl LazyCollection {
    /// Create a new unresolved handle around a resolver
    pub fn new<F>(resolver: F) -> Self
    where
        F: FnOnce() -> Vec<Record> + Send + 'static,
    {
        Self::from_state(OnceCell::new(), Some(Box::new(resolver)))
    }

    /// Create a handle that is already resolved to `records`
    pub fn resolved(records: Vec<Record>) -> Self {
        Self::from_state(OnceCell::with_value(RwLock::new(records)), None)
    }

    fn from_state(items: OnceCell<RwLock<Vec<Record>>>, resolver: Option<Resolver>) -> Self {
        Self {
            state: Arc::new(LazyState {
                items,
                resolver: Mutex::new(resolver),
            }),
        }
    }

    /// Check if the resolver has run
    pub fn is_resolved(&self) -> bool {
        self.state.items.get().is_some()
    }

    fn items(&self) -> &RwLock<Vec<Record>> {
        self.state.items.get_or_init(|| {
            let resolver = self
                .state
                .resolver
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            RwLock::new(resolver.map(|resolve| resolve()).unwrap_or_default())
        })
    }

    /// Resolve if necessary and borrow the cached sequence
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Record>> {
        self.items().read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve if necessary and mutably borrow the cached sequence
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Record>> {
        self.items().write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Independent handle with the same contents.
    ///
    /// A resolved handle is copied right away. An unresolved one stays
    /// deferred and reads this handle on first access. Writes through either
    /// handle are never seen by the other.
    pub fn fork(&self) -> Self {
        if let Some(items) = self.state.items.get() {
            let items = items.read().unwrap_or_else(PoisonError::into_inner);
            return Self::resolved(items.iter().map(Record::detach).collect());
        }

        let source = self.clone();
        Self::new(move || source.read().iter().map(Record::detach).collect())
    }

    /// Returns true if both handles share the same backing state
    pub fn ptr_eq(&self, other: &LazyCollection) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for LazyCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("LazyCollection");
        match self.state.items.get() {
            Some(items) => debug.field(
                "items",
                &*items.read().unwrap_or_else(PoisonError::into_inner),
            ),
            None => debug.field("items", &"<unresolved>"),
        };
        debug.finish()
    }
}
