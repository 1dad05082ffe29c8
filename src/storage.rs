//! Local persisted state.
//!
//! A single JSON object on disk stands in for browser local storage. Keys
//! are fixed strings (see the `KEY_*` constants); values are arbitrary JSON.
//!
//! DESIGN
//! ======
//! The whole object is loaded once at open and kept in memory behind a
//! mutex. Every write edits a copy of the map under that lock, rewrites the
//! file through a sibling temp file and a rename, and only then swaps the
//! copy in. A failed write leaves both memory and disk at the previous
//! contents. A missing file is an empty store; a corrupt file is an error
//! at open.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::TokenStore;

pub const KEY_AUTH_TOKEN: &str = "authToken";
pub const KEY_AUTO_DOWNLOAD: &str = "autoDownloadRecordings";
pub const KEY_RECORDINGS: &str = "callRecordings";
const NOTES_PREFIX: &str = "callNotes_";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Metadata kept for a downloaded call recording.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub call_id: String,
    pub file_name: String,
    pub duration_secs: u64,
    pub recorded_at: String,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl LocalStore {
    /// Open the store at `path`, creating nothing until the first write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read and
    /// [`StoreError::Json`] if it is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), keys = data.len(), "local store opened");
        Ok(Self { path, data: Mutex::new(data) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Typed read. A value of the wrong shape reads as absent.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let value = data.get(key)?.clone();
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value has unexpected shape");
                None
            }
        }
    }

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the value cannot be serialized or the file written.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.modify(|data| {
            data.insert(key.to_owned(), value);
            Ok(((), true))
        })
    }

    /// Returns whether the key was present.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file cannot be written.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.modify(|data| {
            let removed = data.remove(key).is_some();
            Ok((removed, removed))
        })
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    /// Read-modify-write under one lock. `edit` works on a copy and reports
    /// whether it changed anything; the copy replaces the live map only after
    /// a successful flush.
    fn modify<R>(
        &self,
        edit: impl FnOnce(&mut Map<String, Value>) -> Result<(R, bool), StoreError>,
    ) -> Result<R, StoreError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = data.clone();
        let (result, changed) = edit(&mut next)?;
        if changed {
            self.flush(&next)?;
            *data = next;
        }
        Ok(result)
    }

    fn flush(&self, data: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }

    // =========================================================================
    // TYPED KEYS
    // =========================================================================

    /// Whether recordings are downloaded automatically. Defaults to `false`.
    #[must_use]
    pub fn auto_download(&self) -> bool {
        self.get(KEY_AUTO_DOWNLOAD).unwrap_or(false)
    }

    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file cannot be written.
    pub fn set_auto_download(&self, enabled: bool) -> Result<(), StoreError> {
        self.set(KEY_AUTO_DOWNLOAD, &enabled)
    }

    #[must_use]
    pub fn call_notes(&self, call_id: &str) -> Option<String> {
        self.get(&notes_key(call_id))
    }

    /// Empty notes remove the key.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file cannot be written.
    pub fn set_call_notes(&self, call_id: &str, notes: &str) -> Result<(), StoreError> {
        if notes.is_empty() {
            self.remove(&notes_key(call_id)).map(|_| ())
        } else {
            self.set(&notes_key(call_id), &notes)
        }
    }

    #[must_use]
    pub fn recordings(&self) -> Vec<RecordingMetadata> {
        self.get(KEY_RECORDINGS).unwrap_or_default()
    }

    /// Append a recording, replacing any previous entry for the same call.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file cannot be written.
    pub fn add_recording(&self, recording: RecordingMetadata) -> Result<(), StoreError> {
        self.modify(|data| {
            let mut list = stored_recordings(data);
            list.retain(|r| r.call_id != recording.call_id);
            list.push(recording);
            data.insert(KEY_RECORDINGS.to_owned(), serde_json::to_value(list)?);
            Ok(((), true))
        })
    }

    /// Returns whether an entry was removed.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the file cannot be written.
    pub fn remove_recording(&self, call_id: &str) -> Result<bool, StoreError> {
        self.modify(|data| {
            let mut list = stored_recordings(data);
            let before = list.len();
            list.retain(|r| r.call_id != call_id);
            if list.len() == before {
                return Ok((false, false));
            }
            data.insert(KEY_RECORDINGS.to_owned(), serde_json::to_value(list)?);
            Ok((true, true))
        })
    }
}

/// Malformed recording lists read as empty, matching [`LocalStore::get`].
fn stored_recordings(data: &Map<String, Value>) -> Vec<RecordingMetadata> {
    data.get(KEY_RECORDINGS)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

fn notes_key(call_id: &str) -> String {
    format!("{NOTES_PREFIX}{call_id}")
}

#[async_trait::async_trait]
impl TokenStore for LocalStore {
    async fn load_token(&self) -> Option<String> {
        self.get::<String>(KEY_AUTH_TOKEN).filter(|t| !t.is_empty())
    }

    fn save_token(&self, token: &str) -> Result<(), StoreError> {
        self.set(KEY_AUTH_TOKEN, &token)
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        self.remove(KEY_AUTH_TOKEN).map(|_| ())
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
