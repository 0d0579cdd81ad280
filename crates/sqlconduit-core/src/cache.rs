//! Cache namespaces for hydrated instances.
//!
//! A [`CacheSet`] holds one [`SubCache`] per entity table. Each database
//! owns a process-wide set and each transaction owns a private one, so
//! instances hydrated inside a transaction never leak into shared state.
//!
//! Expiring an entry keeps its key and instance but marks the instance
//! stale, so the next access re-hydrates it from the database.

use crate::error::{Error, TypeError};
use crate::model::Cached;
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cache key derived from a primary key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimaryKey {
    Int(i64),
    Text(String),
}

impl TryFrom<&Value> for PrimaryKey {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(v) => Ok(PrimaryKey::Int(*v)),
            Value::Text(s) => Ok(PrimaryKey::Text(s.clone())),
            other => Err(Error::Type(TypeError {
                expected: "INTEGER or TEXT primary key",
                actual: other.type_name().to_string(),
                column: None,
            })),
        }
    }
}

impl From<PrimaryKey> for Value {
    fn from(key: PrimaryKey) -> Self {
        match key {
            PrimaryKey::Int(v) => Value::Int(v),
            PrimaryKey::Text(s) => Value::Text(s),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(v) => write!(f, "{v}"),
            PrimaryKey::Text(s) => write!(f, "{s}"),
        }
    }
}

/// The same instance viewed twice: once for downcasting, once for expiry.
#[derive(Clone)]
struct Entry {
    any: Arc<dyn Any + Send + Sync>,
    cached: Arc<dyn Cached>,
}

/// Keyed store of hydrated instances for one entity table.
pub struct SubCache {
    table: String,
    enabled: bool,
    entries: Mutex<HashMap<PrimaryKey, Entry>>,
}

impl SubCache {
    fn new(table: &str, enabled: bool) -> Self {
        Self {
            table: table.to_string(),
            enabled,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PrimaryKey, Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Get the cached instance for `key` as a concrete type.
    pub fn get<M: Cached>(&self, key: &PrimaryKey) -> Option<Arc<M>> {
        let entry = self.entries().get(key).cloned()?;
        entry.any.downcast::<M>().ok()
    }

    /// Get the cached instance for `key` without knowing its type.
    pub fn try_get(&self, key: &PrimaryKey) -> Option<Arc<dyn Cached>> {
        self.entries().get(key).map(|e| Arc::clone(&e.cached))
    }

    /// Store an instance. A disabled cache keeps nothing.
    pub fn put<M: Cached>(&self, key: PrimaryKey, instance: Arc<M>) {
        if !self.enabled {
            return;
        }
        let entry = Entry {
            any: Arc::clone(&instance) as Arc<dyn Any + Send + Sync>,
            cached: instance as Arc<dyn Cached>,
        };
        self.entries().insert(key, entry);
    }

    /// Snapshot of every key currently held.
    pub fn all_ids(&self) -> Vec<PrimaryKey> {
        self.entries().keys().cloned().collect()
    }

    /// Mark one instance stale. Returns whether the key was present.
    pub fn expire(&self, key: &PrimaryKey) -> bool {
        match self.try_get(key) {
            Some(instance) => {
                instance.expire();
                true
            }
            None => false,
        }
    }

    pub fn expire_all(&self) {
        let instances: Vec<_> = self
            .entries()
            .values()
            .map(|e| Arc::clone(&e.cached))
            .collect();
        for instance in instances {
            instance.expire();
        }
    }

    pub fn remove(&self, key: &PrimaryKey) -> bool {
        self.entries().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl fmt::Debug for SubCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubCache")
            .field("table", &self.table)
            .field("enabled", &self.enabled)
            .field("len", &self.len())
            .finish()
    }
}

/// One sub-cache per entity table.
#[derive(Debug)]
pub struct CacheSet {
    enabled: bool,
    subs: Mutex<HashMap<String, Arc<SubCache>>>,
}

impl CacheSet {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            subs: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The sub-cache for `table`, created on first use.
    pub fn sub_cache(&self, table: &str) -> Arc<SubCache> {
        let mut subs = self
            .subs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            subs.entry(table.to_string())
                .or_insert_with(|| Arc::new(SubCache::new(table, self.enabled))),
        )
    }

    pub fn all_sub_caches(&self) -> Vec<Arc<SubCache>> {
        self.subs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
