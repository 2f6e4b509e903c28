//! Where the Replicate API key lives between runs.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

pub trait CredentialStore: Send + Sync {
    /// The stored key, or `None` when absent or blank.
    fn get(&self) -> Option<String>;

    fn set(&self, api_key: String) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    api_key: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: RwLock::new(api_key),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|key| !key.trim().is_empty())
    }

    fn set(&self, api_key: String) -> io::Result<()> {
        *self.api_key.write().unwrap_or_else(PoisonError::into_inner) = Some(api_key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    api_key: String,
}

/// JSON file holding `{ "api_key": "..." }`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Could not read credentials");
                return None;
            }
        };

        match serde_json::from_str::<StoredCredentials>(&raw) {
            Ok(stored) => Some(stored.api_key).filter(|key| !key.trim().is_empty()),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable credentials file");
                None
            }
        }
    }

    fn set(&self, api_key: String) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&StoredCredentials { api_key })?;
        fs::write(&self.path, body)?;
        tracing::info!(path = %self.path.display(), "API key saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::default();
        assert_eq!(store.get(), None);

        store.set("r8_key".into()).unwrap();
        assert_eq!(store.get().as_deref(), Some("r8_key"));

        store.set("   ".into()).unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested/credentials.json"));
        assert_eq!(store.get(), None);

        store.set("r8_secret".into()).unwrap();
        assert_eq!(store.get().as_deref(), Some("r8_secret"));

        let reopened = FileCredentialStore::new(dir.path().join("nested/credentials.json"));
        assert_eq!(reopened.get().as_deref(), Some("r8_secret"));
    }

    #[test]
    fn test_file_store_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(FileCredentialStore::new(path).get(), None);
    }
}
