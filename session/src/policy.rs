//! Lenient wrappers around [`SessionStore`] operations.
//!
//! A visitor never sees a storage failure: whatever goes wrong is logged and
//! the request carries on as if there were no session data.

use tracing::{error, warn};

use crate::store::{SessionData, SessionStore};

/// Load `id`, treating any failure as an empty session.
pub async fn load_or_empty(store: &dyn SessionStore, id: &str) -> SessionData {
    match store.load(id).await {
        Ok(data) => data,
        Err(e) if e.is_corrupt() => {
            warn!(session_id = %id, error = %e, "Ignoring unreadable session data");
            SessionData::new()
        }
        Err(e) => {
            error!(session_id = %id, error = %e, "Session load failed, starting empty");
            SessionData::new()
        }
    }
}

/// Save `data` under `id`. Returns whether the write went through.
pub async fn save_or_log(store: &dyn SessionStore, id: &str, data: &SessionData) -> bool {
    match store.save(id, data).await {
        Ok(()) => true,
        Err(e) => {
            warn!(session_id = %id, error = %e, "Session save failed");
            false
        }
    }
}

/// Destroy `id`, logging any failure.
pub async fn destroy_or_log(store: &dyn SessionStore, id: &str) {
    if let Err(e) = store.destroy(id).await {
        warn!(session_id = %id, error = %e, "Session destroy failed");
    }
}
