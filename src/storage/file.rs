//! File-per-key storage backend.
//!
//! Storage layout:
//! ```text
//! <data_dir>/
//! ├── offline_3ameta.entry
//! ├── offline_3av1_3a<qid>.entry
//! └── ...
//! ```
//!
//! Keys are escaped into filenames with a reversible `_xx` hex encoding so
//! that `keys()` can recover the original key from the file name.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use super::{PersistentStore, StoreError};

/// File extension for stored entries.
const ENTRY_EXTENSION: &str = "entry";

/// Escape character for the filename encoding.
const ESCAPE: char = '_';

/// Durable store keeping one file per key under a data directory.
///
/// The directory is created lazily on first write. A missing file reads as
/// `None`, matching the idempotency contract.
#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", encode_key(key), ENTRY_EXTENSION))
    }
}

/// Encode a key into a filename-safe string. Alphanumerics, `-` and `.` are
/// kept; everything else (including the escape character itself) becomes
/// `_` followed by two hex digits.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' => out.push(b as char),
            _ => out.push_str(&format!("{}{:02x}", ESCAPE, b)),
        }
    }
    out
}

fn decode_key(encoded: &str) -> Result<String, StoreError> {
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(c) = chars.next() {
        if c == ESCAPE {
            let hi = chars.next();
            let lo = chars.next();
            let pair = match (hi, lo) {
                (Some(h), Some(l)) => format!("{h}{l}"),
                _ => return Err(StoreError::InvalidKey(encoded.to_string())),
            };
            let b = u8::from_str_radix(&pair, 16)
                .map_err(|_| StoreError::InvalidKey(encoded.to_string()))?;
            bytes.push(b);
        } else {
            bytes.push(c as u8);
        }
    }
    String::from_utf8(bytes).map_err(|_| StoreError::InvalidKey(encoded.to_string()))
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.key_path(key);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| StoreError::Io(self.data_dir.clone(), e))?;

        let path = self.key_path(key);
        fs::write(&path, value)
            .await
            .map_err(|e| StoreError::Io(path, e))
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let path = self.key_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(self.data_dir.clone(), e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(self.data_dir.clone(), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(decode_key(stem)?);
            }
        }
        Ok(keys)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        for key in self.keys().await? {
            self.remove_item(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[test]
    fn test_key_encoding_roundtrip() {
        for key in ["offline:v1:abc", "plain", "with_underscore", "a/b c"] {
            assert_eq!(decode_key(&encode_key(key)).unwrap(), key);
        }
    }

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let (store, _temp) = test_store();
        assert_eq!(store.get_item("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data");
        let store = FileStore::new(nested.clone());

        store.set_item("offline:v1:a", "payload").await.unwrap();
        assert!(nested.exists());
        assert_eq!(
            store.get_item("offline:v1:a").await.unwrap(),
            Some("payload".to_string())
        );
    }

    #[tokio::test]
    async fn test_keys_recovers_original_names() {
        let (store, _temp) = test_store();
        store.set_item("offline:v1:a", "1").await.unwrap();
        store.set_item("offline:meta", "2").await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["offline:meta", "offline:v1:a"]);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let (store, _temp) = test_store();
        store.set_item("a", "1").await.unwrap();
        store.set_item("b", "2").await.unwrap();

        store.remove_item("a").await.unwrap();
        assert_eq!(store.get_item("a").await.unwrap(), None);

        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }
}
