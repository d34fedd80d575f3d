//! In-memory local persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{LocalPersistence, LocalStoreError};

/// A [`LocalPersistence`] held in process memory.
///
/// Clones share the same entries, which makes it easy to model several views
/// of the same device in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove everything stored.
    pub fn reset(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LocalPersistence for MemoryLocalStore {
    fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
