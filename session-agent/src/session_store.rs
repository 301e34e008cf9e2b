// session-agent/src/session_store.rs
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::models::identity::Identity;

/// Errors surfaced by the session cache.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence seam for the client-side session cache: one profile slot
/// plus the sticky logged-out marker.
///
/// The reconciler treats every call as best-effort. A failing store is
/// logged and worked around; the in-memory state stays authoritative.
pub trait SessionStore: Send + Sync {
    /// Profile cached by the last successful login or reconcile pass.
    fn load_profile(&self) -> Result<Option<Identity>, SessionStoreError>;

    fn save_profile(&self, profile: &Identity) -> Result<(), SessionStoreError>;

    fn clear_profile(&self) -> Result<(), SessionStoreError>;

    /// Set the marker that keeps the session dead across restarts.
    fn set_logged_out(&self) -> Result<(), SessionStoreError>;

    fn clear_logged_out(&self) -> Result<(), SessionStoreError>;

    fn logged_out(&self) -> Result<bool, SessionStoreError>;
}

/// On-disk layout of the cache file. Both slots live in one file so a
/// forced logout replaces them atomically in a single write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CachedSession {
    profile: Option<Identity>,
    logged_out: bool,
}

// In-memory store

/// Process-local store for embedding and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<CachedSession>,
}

impl SessionStore for MemoryStore {
    fn load_profile(&self) -> Result<Option<Identity>, SessionStoreError> {
        Ok(self.lock().profile.clone())
    }

    fn save_profile(&self, profile: &Identity) -> Result<(), SessionStoreError> {
        self.lock().profile = Some(profile.clone());
        Ok(())
    }

    fn clear_profile(&self) -> Result<(), SessionStoreError> {
        self.lock().profile = None;
        Ok(())
    }

    fn set_logged_out(&self) -> Result<(), SessionStoreError> {
        self.lock().logged_out = true;
        Ok(())
    }

    fn clear_logged_out(&self) -> Result<(), SessionStoreError> {
        self.lock().logged_out = false;
        Ok(())
    }

    fn logged_out(&self) -> Result<bool, SessionStoreError> {
        Ok(self.lock().logged_out)
    }
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, CachedSession> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// File-backed store

/// JSON-file-backed store surviving agent restarts.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<CachedSession, SessionStoreError> {
        if !self.path.exists() {
            return Ok(CachedSession::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Current contents for a read-modify-write. A corrupt file falls back
    /// to the default since the write is about to replace it anyway.
    fn read_for_update(&self) -> CachedSession {
        match self.read() {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("Session cache unreadable, starting fresh: {}", e);
                CachedSession::default()
            }
        }
    }

    fn write(&self, cached: &CachedSession) -> Result<(), SessionStoreError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string_pretty(cached)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn load_profile(&self) -> Result<Option<Identity>, SessionStoreError> {
        Ok(self.read()?.profile)
    }

    fn save_profile(&self, profile: &Identity) -> Result<(), SessionStoreError> {
        let mut cached = self.read_for_update();
        cached.profile = Some(profile.clone());
        self.write(&cached)
    }

    fn clear_profile(&self) -> Result<(), SessionStoreError> {
        let mut cached = self.read_for_update();
        cached.profile = None;
        self.write(&cached)
    }

    fn set_logged_out(&self) -> Result<(), SessionStoreError> {
        let mut cached = self.read_for_update();
        cached.logged_out = true;
        self.write(&cached)
    }

    fn clear_logged_out(&self) -> Result<(), SessionStoreError> {
        let mut cached = self.read_for_update();
        cached.logged_out = false;
        self.write(&cached)
    }

    fn logged_out(&self) -> Result<bool, SessionStoreError> {
        Ok(self.read()?.logged_out)
    }
}
