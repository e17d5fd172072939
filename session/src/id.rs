//! Session identifier generation and validation.

use rand::rngs::OsRng;
use rand::TryRngCore;
use statekeeper_core::{IdPolicy, SESSION_ID_BYTES};
use tracing::{debug, warn};

use crate::store::{SessionError, SessionResult};

/// Generate a fresh identifier: 16 bytes from the OS random source, lowercase hex.
///
/// A failing random source is reported as [`SessionError::Entropy`]; there is
/// no weaker fallback.
pub fn generate_session_id() -> SessionResult<String> {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SessionError::Entropy(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// True for identifiers shaped like [`generate_session_id`] output.
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_BYTES * 2
        && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// The identifier a request will use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    pub id: String,
    /// Whether the id was freshly generated rather than taken from the client
    pub issued: bool,
}

/// Pick the session id for a request from the client's cookie value.
///
/// Under [`IdPolicy::Legacy`] any non-empty value is trusted verbatim. Under
/// [`IdPolicy::Strict`] values that do not look like generated ids are
/// replaced by a new one.
pub fn resolve_session_id(cookie: Option<&str>, policy: IdPolicy) -> SessionResult<ResolvedId> {
    match cookie.filter(|id| !id.is_empty()) {
        Some(id) if policy == IdPolicy::Legacy || is_valid_session_id(id) => Ok(ResolvedId {
            id: id.to_string(),
            issued: false,
        }),
        Some(rejected) => {
            warn!(cookie = %rejected.escape_debug(), "Rejecting malformed session id");
            issue()
        }
        None => issue(),
    }
}

fn issue() -> SessionResult<ResolvedId> {
    let id = generate_session_id()?;
    debug!(session_id = %id, "Issued new session id");
    Ok(ResolvedId { id, issued: true })
}
