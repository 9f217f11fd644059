use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StorageErrorKind;

pub const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque byte storage keyed by session id.
///
/// Implementations must make `put` atomic per id: a concurrent `get` sees either the old
/// bytes or the new ones, never a mix.
pub trait BlobStore: Send + Sync {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StorageErrorKind>;

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StorageErrorKind>;

    /// Returns whether anything was removed.
    fn remove(&self, id: &str) -> Result<bool, StorageErrorKind>;

    fn exists(&self, id: &str) -> Result<bool, StorageErrorKind> {
        Ok(self.get(id)?.is_some())
    }
}

impl<T: BlobStore + ?Sized> BlobStore for std::sync::Arc<T> {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StorageErrorKind> {
        (**self).put(id, bytes)
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StorageErrorKind> {
        (**self).get(id)
    }

    fn remove(&self, id: &str) -> Result<bool, StorageErrorKind> {
        (**self).remove(id)
    }

    fn exists(&self, id: &str) -> Result<bool, StorageErrorKind> {
        (**self).exists(id)
    }
}

/// Session ids are ASCII `[A-Za-z0-9_-]`, non-empty and at most [`MAX_SESSION_ID_LEN`]
/// bytes, so they are safe to use as file names.
pub fn validate_session_id(id: &str) -> Result<(), StorageErrorKind> {
    let valid = !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        let shown: String = id.chars().take(MAX_SESSION_ID_LEN).collect();
        Err(StorageErrorKind::InvalidSessionId(shown))
    }
}

/// In-process store, mainly for tests and short-lived services.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StorageErrorKind> {
        validate_session_id(id)?;
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StorageErrorKind> {
        validate_session_id(id)?;
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned())
    }

    fn remove(&self, id: &str) -> Result<bool, StorageErrorKind> {
        validate_session_id(id)?;
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id)
            .is_some())
    }

    fn exists(&self, id: &str) -> Result<bool, StorageErrorKind> {
        validate_session_id(id)?;
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(id))
    }
}
