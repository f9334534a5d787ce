//! Serialization of queued operations for storage.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::entry::QueueEntryOperation;

/// Storable form of a queue entry.
///
/// The shape is private to the store; the only contract is that it
/// round-trips through an [`OperationSerializer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedQueueRecord<T> {
    pub qid: Uuid,
    pub op: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Uuid>,
    pub enqueued_at: DateTime<Utc>,
}

impl<T: Clone> PersistedQueueRecord<T> {
    pub fn from_operation(operation: &QueueEntryOperation<T>) -> Self {
        Self {
            qid: operation.qid,
            op: operation.op.clone(),
            depends_on: operation.depends_on,
            enqueued_at: operation.enqueued_at,
        }
    }

    pub fn into_operation(self) -> QueueEntryOperation<T> {
        QueueEntryOperation {
            qid: self.qid,
            op: self.op,
            depends_on: self.depends_on,
            enqueued_at: self.enqueued_at,
        }
    }
}

/// Errors converting queued operations to or from their stored form.
#[derive(Debug, Clone, Error)]
pub enum SerializerError {
    #[error("failed to serialize queued operation: {0}")]
    Serialize(String),
    #[error("failed to deserialize queued operation: {0}")]
    Deserialize(String),
}

/// Converts an in-flight operation to and from a storable representation.
pub trait OperationSerializer<T>: Send + Sync {
    fn serialize_for_storage(
        &self,
        record: &PersistedQueueRecord<T>,
    ) -> Result<String, SerializerError>;

    fn deserialize_from_storage(&self, raw: &str)
        -> Result<PersistedQueueRecord<T>, SerializerError>;
}

/// Default serializer: plain JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonOperationSerializer;

impl<T> OperationSerializer<T> for JsonOperationSerializer
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn serialize_for_storage(
        &self,
        record: &PersistedQueueRecord<T>,
    ) -> Result<String, SerializerError> {
        serde_json::to_string(record).map_err(|e| SerializerError::Serialize(e.to_string()))
    }

    fn deserialize_from_storage(
        &self,
        raw: &str,
    ) -> Result<PersistedQueueRecord<T>, SerializerError> {
        serde_json::from_str(raw).map_err(|e| SerializerError::Deserialize(e.to_string()))
    }
}
