//! Durable JSON document store
//!
//! Small named documents (community configuration, name overrides, activity
//! snapshots) kept as pretty-printed JSON files under a data directory. Loading a missing
//! document yields its `Default`; saving is last-writer-wins and goes through
//! a staging file plus rename so readers never see a half-written document.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::types::StorageError;

/// Store of named JSON documents in one directory
#[derive(Debug, Clone)]
pub struct JsonStore {
    base_dir: PathBuf,
}

impl JsonStore {
    /// Open a store, creating the directory if needed
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|source| io_error(&base_dir, source))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of a named document
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Load a document, or its default if it was never saved
    pub async fn load<T>(&self, name: &str) -> Result<T, StorageError>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path_of(name);
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Document missing, using default");
                return Ok(T::default());
            }
            Err(source) => return Err(io_error(&path, source)),
        };

        if json.trim().is_empty() {
            return Ok(T::default());
        }

        serde_json::from_str(&json).map_err(|source| StorageError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Save a document, replacing any previous version
    pub async fn save<T>(&self, name: &str, value: &T) -> Result<(), StorageError>
    where
        T: Serialize + ?Sized,
    {
        let path = self.path_of(name);
        let staged = self.base_dir.join(format!(".{name}.tmp"));

        let json = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            path: path.display().to_string(),
            source,
        })?;

        fs::write(&staged, json)
            .await
            .map_err(|source| io_error(&staged, source))?;
        fs::rename(&staged, &path)
            .await
            .map_err(|source| io_error(&path, source))?;

        debug!(path = %path.display(), "Document saved");
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
