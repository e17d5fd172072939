use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use statekeeper_core::SessionConfig;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::store::{is_expired, SessionData, SessionError, SessionInfo, SessionResult, SessionStore};

/// Prefix of every session file name.
pub const SESSION_FILE_PREFIX: &str = "sess_";

/// Session store keeping one JSON file per session in a single directory.
///
/// A session's age is its file's modification time, so every save refreshes
/// it. Expired files are only removed when loaded or by
/// [`SessionStore::cleanup_expired`]; nothing sweeps in the background.
/// Concurrent writers to the same id are not coordinated: the last write wins.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    timeout: Duration,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.session_dir.clone(), config.timeout())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `id`.
    ///
    /// The id is appended to the prefix as-is; callers that do not trust it
    /// must validate it first (see [`crate::id::resolve_session_id`]).
    pub fn session_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{SESSION_FILE_PREFIX}{id}"))
    }

    async fn remove_if_present(&self, path: &Path) -> SessionResult<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::io(path, e)),
        }
    }

    async fn read_data(&self, path: &Path) -> SessionResult<SessionData> {
        let content = fs::read(path)
            .await
            .map_err(|e| SessionError::io(path, e))?;
        // All-or-nothing: one non-string value rejects the whole record, the
        // string fields are not salvaged.
        serde_json::from_slice(&content).map_err(|source| SessionError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, id: &str) -> SessionResult<SessionData> {
        if id.is_empty() {
            return Ok(SessionData::new());
        }

        let path = self.session_path(id);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(session_id = %id, "No session file");
                return Ok(SessionData::new());
            }
            Err(e) => return Err(SessionError::io(&path, e)),
        };

        let modified = metadata
            .modified()
            .map_err(|e| SessionError::io(&path, e))?;

        if is_expired(modified, SystemTime::now(), self.timeout) {
            info!(session_id = %id, "Session expired, removing");
            // The data is logically gone either way; a failed delete is retried on the next load.
            if let Err(e) = self.remove_if_present(&path).await {
                warn!(session_id = %id, error = %e, "Failed to remove expired session");
            }
            return Ok(SessionData::new());
        }

        let data = self.read_data(&path).await?;
        debug!(session_id = %id, keys = data.len(), "Loaded session");
        Ok(data)
    }

    async fn save(&self, id: &str, data: &SessionData) -> SessionResult<()> {
        if id.is_empty() {
            return Err(SessionError::EmptyId);
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| SessionError::io(&self.dir, e))?;

        let content = serde_json::to_vec(data).map_err(SessionError::Serialize)?;
        let path = self.session_path(id);
        fs::write(&path, content)
            .await
            .map_err(|e| SessionError::io(&path, e))?;

        debug!(session_id = %id, keys = data.len(), "Saved session");
        Ok(())
    }

    async fn destroy(&self, id: &str) -> SessionResult<()> {
        if id.is_empty() {
            return Ok(());
        }

        let path = self.session_path(id);
        if self.remove_if_present(&path).await? {
            debug!(session_id = %id, "Destroyed session");
        }
        Ok(())
    }

    async fn list(&self) -> SessionResult<Vec<SessionInfo>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::io(&self.dir, e)),
        };

        let now = SystemTime::now();
        let mut sessions = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::io(&self.dir, e))?
        {
            let file_name = entry.file_name();
            let Some(id) = file_name
                .to_str()
                .and_then(|name| name.strip_prefix(SESSION_FILE_PREFIX))
            else {
                continue;
            };

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                    continue;
                }
            };
            let modified = metadata
                .modified()
                .map_err(|e| SessionError::io(&path, e))?;
            let keys = self.read_data(&path).await.ok().map(|data| data.len());

            sessions.push(SessionInfo::new(
                id.to_string(),
                modified,
                now,
                self.timeout,
                keys,
            ));
        }

        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("Listed {} sessions", sessions.len());
        Ok(sessions)
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        let mut count = 0;
        for session in self.list().await?.into_iter().filter(|s| s.expired) {
            if self.remove_if_present(&self.session_path(&session.id)).await? {
                debug!(session_id = %session.id, "Cleaned up expired session");
                count += 1;
            }
        }

        if count > 0 {
            info!("Cleaned up {} expired sessions", count);
        }

        Ok(count)
    }
}
