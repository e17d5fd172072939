use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Key/value payload of a session.
///
/// Ordered so that the persisted JSON is stable across saves.
pub type SessionData = BTreeMap<String, String>;

/// Error type for session store operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt session data in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize session: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Session id must not be empty")]
    EmptyId,

    /// The OS random source failed; there is no fallback.
    #[error("Secure random source unavailable: {0}")]
    Entropy(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl SessionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error only means "no usable data", as opposed to a broken store.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, SessionError::Corrupt { .. })
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Summary of one stored session, as seen by maintenance commands
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: String,
    /// Last modification time of the backing record
    pub modified: DateTime<Utc>,
    pub age: Duration,
    pub expired: bool,
    /// Number of stored keys, `None` if the record could not be parsed
    pub keys: Option<usize>,
}

impl SessionInfo {
    pub fn new(
        id: String,
        modified: SystemTime,
        now: SystemTime,
        timeout: Duration,
        keys: Option<usize>,
    ) -> Self {
        Self {
            id,
            modified: DateTime::<Utc>::from(modified),
            age: age_of(modified, now),
            expired: is_expired(modified, now, timeout),
            keys,
        }
    }
}

/// Time elapsed since `modified`. A timestamp in the future counts as zero age.
pub fn age_of(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

/// A session is expired once its age is strictly greater than the timeout.
pub fn is_expired(modified: SystemTime, now: SystemTime, timeout: Duration) -> bool {
    age_of(modified, now) > timeout
}

/// Trait defining the interface for session stores
///
/// Every operation reports failures explicitly. Callers that want the
/// "treat failures as no data" behavior use the helpers in [`crate::policy`].
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Load the data for `id`. An empty id, a missing record and an expired
    /// record all yield an empty map; an expired record is deleted first.
    async fn load(&self, id: &str) -> SessionResult<SessionData>;

    /// Persist `data` under `id`, replacing whatever was stored before
    async fn save(&self, id: &str, data: &SessionData) -> SessionResult<()>;

    /// Delete the record for `id`. Deleting a missing record is not an error.
    async fn destroy(&self, id: &str) -> SessionResult<()>;

    /// List every stored session, expired ones included
    async fn list(&self) -> SessionResult<Vec<SessionInfo>>;

    /// Delete expired sessions, returning how many were removed
    async fn cleanup_expired(&self) -> SessionResult<usize>;
}
