use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use log::debug;

use crate::error::StorageError;

/// Key-addressed byte storage consumed by a verification run.
pub trait ByteStore {
    fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Stores `bytes` under `key` and returns the key it was stored under.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Removes `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Stores each key as a file below a root directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys are `/`-separated; parent and root components are dropped so a
    /// key can never leave the root.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for component in Path::new(key).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }
}

impl ByteStore for LocalStore {
    fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        debug!("Reading '{key}' from {path:?}");
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Io {
                key: key.to_string(),
                source,
            },
        })
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.path_for(key);
        let io_error = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(&path, bytes).map_err(io_error)?;
        debug!("Wrote {} byte(s) for '{key}' to {path:?}", bytes.len());
        Ok(key.to_string())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed '{key}' at {path:?}");
                Ok(())
            }
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}
