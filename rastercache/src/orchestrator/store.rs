//! Durable artifact storage seam.

use crate::cache::CacheKey;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::trace;

/// Errors from an artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key's relative path escapes the store root.
    #[error("invalid artifact path: {0}")]
    InvalidPath(String),
}

/// On-disk index of persisted artifacts.
///
/// Directory layout, sharding, and metadata are the implementation's
/// business; the orchestrator only needs to find, name, and write artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Path of the persisted artifact for `key`, if it exists.
    fn locate(&self, key: &CacheKey) -> Option<PathBuf>;

    /// Path the artifact for `key` is (or will be) stored at.
    fn path_for(&self, key: &CacheKey) -> Result<PathBuf, StoreError>;

    /// Persist `data` for `key`. Readers never observe a partial file.
    fn write(&self, key: &CacheKey, data: &[u8]) -> Result<(), StoreError>;
}

/// Flat directory store.
///
/// An artifact for `photos/a.jpg` modified at `t` lives at
/// `<root>/photos/a.jpg.<t as nanos>.cache`, so a rewritten source gets a
/// new file instead of serving stale bytes.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl DirectoryStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate(relative: &str) -> Result<(), StoreError> {
        if relative.is_empty() {
            return Err(StoreError::InvalidPath("empty path".to_string()));
        }
        let escapes = Path::new(relative)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StoreError::InvalidPath(relative.to_string()));
        }
        Ok(())
    }
}

impl ArtifactStore for DirectoryStore {
    fn locate(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path_for(key).ok()?;
        path.is_file().then_some(path)
    }

    fn path_for(&self, key: &CacheKey) -> Result<PathBuf, StoreError> {
        let relative = key.relative_path();
        Self::validate(relative)?;
        let file = format!("{}.{}.cache", relative, key.modified_nanos());
        Ok(self.root.join(file))
    }

    fn write(&self, key: &CacheKey, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let suffix = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let mut temp = path.clone().into_os_string();
        temp.push(format!(".{}.{}.tmp", std::process::id(), suffix));
        let temp = PathBuf::from(temp);

        let written = fs::File::create(&temp).and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(err) = written.and_then(|_| fs::rename(&temp, &path)) {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }

        trace!(path = %path.display(), bytes = data.len(), "Artifact persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    fn key(path: &str) -> CacheKey {
        CacheKey::new(path, UNIX_EPOCH + Duration::from_secs(10))
    }

    #[test]
    fn test_write_then_locate() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();

        assert!(store.locate(&key("photos/a.jpg")).is_none());
        store.write(&key("photos/a.jpg"), b"pixels").unwrap();

        let path = store.locate(&key("Photos/A.jpg")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"pixels");
        assert!(path.starts_with(dir.path()));
    }

    #[test]
    fn test_timestamp_is_part_of_path() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();
        let newer = CacheKey::new("a.jpg", UNIX_EPOCH + Duration::from_secs(11));

        store.write(&key("a.jpg"), b"old").unwrap();

        assert!(store.locate(&newer).is_none());
        assert_ne!(store.path_for(&key("a.jpg")).unwrap(), store.path_for(&newer).unwrap());
    }

    #[test]
    fn test_pre_epoch_timestamps_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();
        let older = CacheKey::new("scans/1969.tif", UNIX_EPOCH - Duration::from_secs(100));
        let newer = CacheKey::new("scans/1969.tif", UNIX_EPOCH - Duration::from_secs(50));

        store.write(&older, b"old").unwrap();
        store.write(&newer, b"new").unwrap();

        assert_ne!(store.path_for(&older).unwrap(), store.path_for(&newer).unwrap());
        assert_eq!(fs::read(store.locate(&older).unwrap()).unwrap(), b"old");
        assert_eq!(fs::read(store.locate(&newer).unwrap()).unwrap(), b"new");
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();

        store.write(&key("a.jpg"), b"first").unwrap();
        store.write(&key("a.jpg"), b"second").unwrap();

        let path = store.locate(&key("a.jpg")).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.path_for(&key("../escape.jpg")),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.write(&key("a/../../escape.jpg"), b"x"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(store.locate(&key("../escape.jpg")).is_none());
    }

    #[test]
    fn test_leading_slash_stays_under_root() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();

        let path = store.path_for(&key("/etc/passwd")).unwrap();
        assert!(path.starts_with(dir.path()));
    }

    #[test]
    fn test_empty_path_rejected() {
        let dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();
        assert!(store.path_for(&key("  ")).is_err());
    }
}
