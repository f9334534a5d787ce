//! Queue-scoped view over a [`PersistentStore`].
//!
//! Entries are written under versioned keys (`offline:v1:<qid>`) and an
//! ordered key index lives under a metadata key, so a restore yields entries
//! in their original enqueue order. Keys carrying an unknown version prefix
//! are skipped on restore rather than failing the whole queue.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use super::entry::QueueEntryOperation;
use super::serializer::{OperationSerializer, PersistedQueueRecord, SerializerError};
use crate::storage::{PersistentStore, StoreError};

/// Version prefix for entry keys; bump when the record shape changes.
const QUEUE_KEY_PREFIX: &str = "offline:v1";

/// Key holding the ordered list of entry keys.
const QUEUE_META_KEY: &str = "offline:meta";

/// Errors persisting or restoring queue entries.
#[derive(Debug, Error)]
pub enum OfflineStoreError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Serializer(#[from] SerializerError),
    #[error("corrupt queue index: {0}")]
    CorruptIndex(String),
}

/// Persistence layer for the offline queue.
pub struct OfflineStore<T> {
    storage: Arc<dyn PersistentStore>,
    serializer: Arc<dyn OperationSerializer<T>>,
}

impl<T: Clone> OfflineStore<T> {
    pub fn new(
        storage: Arc<dyn PersistentStore>,
        serializer: Arc<dyn OperationSerializer<T>>,
    ) -> Self {
        Self {
            storage,
            serializer,
        }
    }

    /// Persist one entry, appending its key to the ordered index.
    pub async fn save_entry(
        &self,
        operation: &QueueEntryOperation<T>,
    ) -> Result<(), OfflineStoreError> {
        let record = PersistedQueueRecord::from_operation(operation);
        let serialized = self.serializer.serialize_for_storage(&record)?;
        let key = offline_key(operation.qid);

        let mut index = self.load_index().await?;
        if !index.contains(&key) {
            index.push(key.clone());
            self.save_index(&index).await?;
        }
        self.storage.set_item(&key, &serialized).await?;
        tracing::debug!(qid = %operation.qid, "persisted queue entry");
        Ok(())
    }

    /// Remove one entry and drop its key from the index.
    pub async fn remove_entry(&self, qid: Uuid) -> Result<(), OfflineStoreError> {
        let key = offline_key(qid);

        let mut index = self.load_index().await?;
        index.retain(|k| k != &key);
        self.save_index(&index).await?;

        self.storage.remove_item(&key).await?;
        tracing::debug!(qid = %qid, "removed persisted queue entry");
        Ok(())
    }

    /// Load all persisted entries in their original enqueue order.
    pub async fn load_entries(&self) -> Result<Vec<PersistedQueueRecord<T>>, OfflineStoreError> {
        let index = self.load_index().await?;
        let mut records = Vec::with_capacity(index.len());

        for key in index {
            if !key.starts_with(QUEUE_KEY_PREFIX) {
                tracing::warn!(key = %key, "skipping queue entry with unknown storage version");
                continue;
            }
            match self.storage.get_item(&key).await? {
                Some(raw) => records.push(self.serializer.deserialize_from_storage(&raw)?),
                None => {
                    tracing::warn!(key = %key, "indexed queue entry missing from storage");
                }
            }
        }
        Ok(records)
    }

    async fn load_index(&self) -> Result<Vec<String>, OfflineStoreError> {
        match self.storage.get_item(QUEUE_META_KEY).await? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| OfflineStoreError::CorruptIndex(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn save_index(&self, index: &[String]) -> Result<(), OfflineStoreError> {
        let raw = serde_json::to_string(index)
            .map_err(|e| OfflineStoreError::CorruptIndex(e.to_string()))?;
        self.storage.set_item(QUEUE_META_KEY, &raw).await?;
        Ok(())
    }
}

fn offline_key(qid: Uuid) -> String {
    format!("{}:{}", QUEUE_KEY_PREFIX, qid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::serializer::JsonOperationSerializer;
    use crate::storage::InMemoryStore;
    use chrono::Utc;

    fn test_store() -> OfflineStore<String> {
        OfflineStore::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(JsonOperationSerializer),
        )
    }

    fn operation(op: &str) -> QueueEntryOperation<String> {
        QueueEntryOperation {
            qid: Uuid::new_v4(),
            op: op.to_string(),
            depends_on: None,
            enqueued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_load_preserves_save_order() {
        let store = test_store();
        let ops = vec![operation("one"), operation("two"), operation("three")];
        for op in &ops {
            store.save_entry(op).await.unwrap();
        }

        let loaded = store.load_entries().await.unwrap();
        let loaded_ops: Vec<&str> = loaded.iter().map(|r| r.op.as_str()).collect();
        assert_eq!(loaded_ops, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_remove_drops_entry_from_order() {
        let store = test_store();
        let ops = vec![operation("one"), operation("two"), operation("three")];
        for op in &ops {
            store.save_entry(op).await.unwrap();
        }

        store.remove_entry(ops[1].qid).await.unwrap();

        let loaded = store.load_entries().await.unwrap();
        let loaded_ops: Vec<&str> = loaded.iter().map(|r| r.op.as_str()).collect();
        assert_eq!(loaded_ops, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn test_save_is_idempotent_per_entry() {
        let store = test_store();
        let op = operation("one");
        store.save_entry(&op).await.unwrap();
        store.save_entry(&op).await.unwrap();

        assert_eq!(store.load_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_loads_nothing() {
        let store = test_store();
        assert!(store.load_entries().await.unwrap().is_empty());
    }
}
