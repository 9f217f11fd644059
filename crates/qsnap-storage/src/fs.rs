use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::blob::{validate_session_id, BlobStore};
use crate::error::StorageErrorKind;

const EXTENSION: &str = "qsnap";

/// One file per session under `root`.
///
/// Writes go to a temporary file that is renamed over the target, so readers never
/// observe a partial snapshot. Writers for the same id are serialised.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, id: &str) -> Result<PathBuf, StorageErrorKind> {
        validate_session_id(id)?;
        Ok(self.root.join(format!("{id}.{EXTENSION}")))
    }

    /// Run `f` holding the write lock for `id`.
    ///
    /// The lock entry is dropped again once no other caller holds it, so the map only
    /// contains ids with a write in flight.
    fn locked<T>(&self, id: &str, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        let out = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f()
        };

        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference is ours and one is the map's.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(id);
        }
        out
    }
}

fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(tmp, path)
}

impl BlobStore for FsBlobStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), StorageErrorKind> {
        let path = self.path(id)?;
        let tmp = self.root.join(format!(".{id}.{EXTENSION}.tmp"));

        self.locked(id, || {
            let written = write_and_rename(&tmp, &path, bytes);
            if written.is_err() {
                let _ = fs::remove_file(&tmp);
            }
            written
        })?;
        tracing::trace!(id, len = bytes.len(), path = %path.display(), "wrote session blob");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StorageErrorKind> {
        match fs::read(self.path(id)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, id: &str) -> Result<bool, StorageErrorKind> {
        let path = self.path(id)?;
        match self.locked(id, || fs::remove_file(path)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&self, id: &str) -> Result<bool, StorageErrorKind> {
        match fs::metadata(self.path(id)?) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
