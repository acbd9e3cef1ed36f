//! Cache artifact to original source path store

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{PoisonError, RwLock};
use tracing::trace;

/// Mapping between cache artifact paths and the original source files they
/// were generated from
///
/// Shared by both directions of every session. Entries are only ever added;
/// the first mapping registered for a cache path stays authoritative.
#[derive(Debug, Default)]
pub struct PathMappingStore {
    entries: RwLock<HashMap<String, String>>,
}

impl PathMappingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Original path registered for `cache_path`
    pub fn get(&self, cache_path: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cache_path)
            .cloned()
    }

    /// Whether `cache_path` has a mapping
    pub fn has(&self, cache_path: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(cache_path)
    }

    /// Register a mapping unless one already exists for `cache_path`
    ///
    /// Returns `true` when the mapping was inserted.
    pub fn set(&self, cache_path: impl Into<String>, original_path: impl Into<String>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(cache_path.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let original_path = original_path.into();
                trace!("Registered mapping {} >>> {}", slot.key(), original_path);
                slot.insert(original_path);
                true
            }
        }
    }

    /// Number of registered mappings
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no mapping has been registered yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
