use statekeeper_core::SessionConfig;
use statekeeper_session::{
    destroy_or_log, load_or_empty, resolve_session_id, save_or_log, SessionResult, SessionStore,
};
use tracing::{debug, info};

use crate::render::{render_page, session_headers, PageView, Response};
use crate::request::{Action, CgiRequest};

pub const FLASH_CLEARED: &str = "Session data cleared!";
pub const FLASH_SAVED: &str = "Data saved!";

/// Form fields a `save` copies into the session
pub const SAVED_FIELDS: [&str; 2] = ["name", "message"];

/// Serve one request against `store`.
///
/// Storage failures never reach the visitor; they are logged and the page
/// renders as if the session were empty. The only error returned is a
/// failure of the random source while issuing a new id.
pub async fn handle(
    request: &CgiRequest,
    store: &dyn SessionStore,
    config: &SessionConfig,
) -> SessionResult<Response> {
    let resolved = resolve_session_id(request.cookie(&config.cookie_name), config.id_policy)?;
    let session_id = resolved.id.as_str();

    let fields = request.form_fields();
    let action = request.action(&fields);
    debug!(
        method = %request.method,
        session_id = %session_id,
        issued = resolved.issued,
        ?action,
        "Handling request"
    );

    let mut flash = None;

    if action == Some(Action::Clear) {
        destroy_or_log(store, session_id).await;
        info!(session_id = %session_id, "Session cleared");
        flash = Some(FLASH_CLEARED);
    }

    // Load after a potential clear so the page reflects it.
    let mut data = load_or_empty(store, session_id).await;

    if action == Some(Action::Save) {
        for key in SAVED_FIELDS {
            if let Some(value) = fields.get(key).filter(|v| !v.is_empty()) {
                data.insert(key.to_string(), value.clone());
            }
        }
        if save_or_log(store, session_id, &data).await {
            info!(session_id = %session_id, keys = data.len(), "Session saved");
        }
        flash = Some(FLASH_SAVED);
    }

    let body = render_page(&PageView {
        title: &config.page_title,
        form_action: &config.form_action,
        flash,
        data: &data,
    });

    Ok(Response {
        headers: session_headers(&config.cookie_name, session_id, config.timeout_secs),
        body,
    })
}
