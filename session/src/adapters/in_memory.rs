use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::store::{is_expired, SessionData, SessionError, SessionInfo, SessionResult, SessionStore};

#[derive(Debug, Clone)]
struct Entry {
    data: SessionData,
    modified: SystemTime,
}

/// In-memory implementation of SessionStore
///
/// Mirrors [`crate::FileSessionStore`] semantics with a per-entry
/// modification time standing in for the file mtime.
#[derive(Debug)]
pub struct InMemorySessionStore {
    /// Thread-safe storage of sessions
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    timeout: Duration,
}

impl InMemorySessionStore {
    /// Create a new InMemorySessionStore
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    /// Overwrite the modification time of a stored session. Returns false if `id` is unknown.
    pub fn set_modified(&self, id: &str, modified: SystemTime) -> SessionResult<bool> {
        let mut sessions = self.write()?;
        Ok(match sessions.get_mut(id) {
            Some(entry) => {
                entry.modified = modified;
                true
            }
            None => false,
        })
    }

    pub fn contains(&self, id: &str) -> SessionResult<bool> {
        Ok(self.read()?.contains_key(id))
    }

    fn read(
        &self,
    ) -> SessionResult<std::sync::RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.sessions.read().map_err(|e| {
            SessionError::StorageError(format!("Failed to acquire read lock: {}", e))
        })
    }

    fn write(
        &self,
    ) -> SessionResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.sessions.write().map_err(|e| {
            SessionError::StorageError(format!("Failed to acquire write lock: {}", e))
        })
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> SessionResult<SessionData> {
        if id.is_empty() {
            return Ok(SessionData::new());
        }

        let mut sessions = self.write()?;
        let Some(entry) = sessions.get(id) else {
            return Ok(SessionData::new());
        };

        // Check if session has expired
        if is_expired(entry.modified, SystemTime::now(), self.timeout) {
            sessions.remove(id);
            info!(session_id = %id, "Session expired, removing");
            return Ok(SessionData::new());
        }

        Ok(entry.data.clone())
    }

    async fn save(&self, id: &str, data: &SessionData) -> SessionResult<()> {
        if id.is_empty() {
            return Err(SessionError::EmptyId);
        }

        let mut sessions = self.write()?;
        sessions.insert(
            id.to_string(),
            Entry {
                data: data.clone(),
                modified: SystemTime::now(),
            },
        );
        debug!(session_id = %id, "Saved session");
        Ok(())
    }

    async fn destroy(&self, id: &str) -> SessionResult<()> {
        let mut sessions = self.write()?;
        if sessions.remove(id).is_some() {
            debug!(session_id = %id, "Deleted session");
        }
        Ok(())
    }

    async fn list(&self) -> SessionResult<Vec<SessionInfo>> {
        let sessions = self.read()?;
        let now = SystemTime::now();

        let mut listed: Vec<SessionInfo> = sessions
            .iter()
            .map(|(id, entry)| {
                SessionInfo::new(
                    id.clone(),
                    entry.modified,
                    now,
                    self.timeout,
                    Some(entry.data.len()),
                )
            })
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));

        debug!("Listed {} sessions", listed.len());
        Ok(listed)
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        let mut sessions = self.write()?;

        let now = SystemTime::now();
        let before = sessions.len();
        sessions.retain(|_, entry| !is_expired(entry.modified, now, self.timeout));

        let count = before - sessions.len();
        if count > 0 {
            info!("Cleaned up {} expired sessions", count);
        }

        Ok(count)
    }
}
