//! Client-held identity storage.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::UNIX_EPOCH;

use crate::error::{AppError, Result};
use crate::models::session::StoredSession;

/// Where a client keeps its tokens and cached profile.
///
/// `save` and `clear` replace the whole snapshot at once.
pub trait SessionStore: Send + Sync {
    /// Returns the current snapshot, if any.
    fn load(&self) -> Option<StoredSession>;
    /// Replaces the snapshot.
    fn save(&self, session: &StoredSession) -> Result<()>;
    /// Forgets all identity state.
    fn clear(&self) -> Result<()>;
}

/// Process-local store.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<Option<StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with `session`.
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<StoredSession> {
        self.inner.read().ok()?.clone()
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| AppError::Internal("Session store lock poisoned".to_string()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| AppError::Internal("Session store lock poisoned".to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Durable store: one JSON file, replaced atomically on every save.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// # Arguments
    ///
    /// * `path` - The JSON file. Its parent directory must exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<StoredSession> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("⚠️  Could not read session file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match sonic_rs::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("⚠️  Ignoring corrupt session file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let json = sonic_rs::to_string(session)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;
        atomic_write(&self.path, &json)?;
        tracing::debug!("💾 Session saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Session path has no file name"))?;

    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name,
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let write_result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserProfile;

    fn sample() -> StoredSession {
        StoredSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            user: Some(UserProfile {
                id: "u".to_string(),
                tenant_id: Some("t".to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn memory_store_save_and_clear() {
        let store = MemorySessionStore::new();
        assert!(store.load().is_none());
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), Some(sample()));
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        FileSessionStore::new(&path).save(&sample()).unwrap();
        assert_eq!(FileSessionStore::new(&path).load(), Some(sample()));

        FileSessionStore::new(&path).clear().unwrap();
        assert!(!path.exists());
        assert!(FileSessionStore::new(&path).load().is_none());
    }

    #[test]
    fn file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        assert!(FileSessionStore::new(&path).load().is_none());
    }

    #[test]
    fn clearing_missing_file_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(FileSessionStore::new(dir.path().join("absent.json")).clear().is_ok());
    }
}
