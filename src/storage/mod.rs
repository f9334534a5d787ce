//! Durable key/value storage for queued operations.
//!
//! The queue persists through [`PersistentStore`], a small asynchronous
//! string key/value contract. Any backend that round-trips values and keeps
//! operations idempotent on retry will do; the crate ships an in-memory map
//! and a file-per-key store.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid stored key: {0}")]
    InvalidKey(String),
}

/// Asynchronous durable key/value storage.
///
/// All operations are idempotent: setting the same value, removing a missing
/// key or clearing an empty store are not errors. The queue is the single
/// logical writer for its key space; concurrent external mutation of the
/// same keys is undefined behavior.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}
