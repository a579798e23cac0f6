//! Key-value persistence for the alarm list and the background image.
//!
//! Each blob is rewritten in full on every change. There is no schema version;
//! the alarm list is a plain JSON array of `Alarm` records.

use crate::components::alarm::Alarm;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Key of the JSON-encoded alarm list.
pub const ALARMS_KEY: &str = "alarms.json";
/// Key of the data-URL encoded background image.
pub const BACKGROUND_KEY: &str = "background.txt";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
enum Backend {
    Directory(PathBuf),
    Memory(Arc<Mutex<HashMap<String, String>>>),
}

/// A string blob store, backed by a directory or by memory.
///
/// Clones share the same backing data.
#[derive(Debug, Clone)]
pub struct Store {
    backend: Backend,
}

impl Store {
    /// Stores one file per key under `dir`, created on first write.
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Directory(dir.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::default()),
        }
    }

    /// A directory store if `dir` is given, otherwise an in-memory one.
    pub fn from_dir(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Self::directory(dir),
            None => Self::in_memory(),
        }
    }

    /// Reads a blob. A missing key is `Ok(None)`.
    pub async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match &self.backend {
            Backend::Directory(dir) => match fs::read_to_string(dir.join(key)).await {
                Ok(text) => Ok(Some(text)),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            },
            Backend::Memory(map) => Ok(map.lock().await.get(key).cloned()),
        }
    }

    pub async fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Directory(dir) => {
                fs::create_dir_all(dir).await?;
                fs::write(dir.join(key), value).await?;
            }
            Backend::Memory(map) => {
                map.lock().await.insert(key.to_string(), value.to_string());
            }
        }
        debug!("wrote {} ({} bytes)", key, value.len());
        Ok(())
    }

    /// Deletes a blob. Deleting a missing key is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Directory(dir) => match fs::remove_file(dir.join(key)).await {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            },
            Backend::Memory(map) => {
                map.lock().await.remove(key);
                Ok(())
            }
        }
    }

    /// Loads the alarm list. Unreadable or malformed data yields an empty list.
    pub async fn load_alarms(&self) -> Vec<Alarm> {
        match self.read(ALARMS_KEY).await {
            Ok(Some(text)) => match serde_json::from_str(&text) {
                Ok(alarms) => alarms,
                Err(err) => {
                    error!("failed to parse stored alarms: {err}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                error!("failed to read stored alarms: {err}");
                Vec::new()
            }
        }
    }

    pub async fn save_alarms(&self, alarms: &[Alarm]) -> Result<(), StoreError> {
        let payload = serde_json::to_string(alarms)?;
        self.write(ALARMS_KEY, &payload).await
    }

    /// Loads the background image, if one was saved and can be read.
    pub async fn load_background(&self) -> Option<String> {
        match self.read(BACKGROUND_KEY).await {
            Ok(background) => background,
            Err(err) => {
                error!("failed to read stored background: {err}");
                None
            }
        }
    }

    /// Saves the background image, or clears it with `None`.
    pub async fn save_background(&self, data_url: Option<&str>) -> Result<(), StoreError> {
        match data_url {
            Some(data_url) => self.write(BACKGROUND_KEY, data_url).await,
            None => self.remove(BACKGROUND_KEY).await,
        }
    }
}
