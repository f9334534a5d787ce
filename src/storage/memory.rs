//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{PersistentStore, StoreError};

/// Map-backed store.
///
/// Useful for tests and for hosts without durable storage; contents do not
/// survive the process.
#[derive(Default)]
pub struct InMemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.lock().unwrap().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.items
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.items.lock().unwrap().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.items.lock().unwrap().keys().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.items.lock().unwrap().clear();
        Ok(())
    }
}
