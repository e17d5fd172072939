use statekeeper_cgi::{handle, CgiRequest, Response};
use statekeeper_core::SessionConfig;
use statekeeper_session::{is_valid_session_id, FileSessionStore, SessionData, SessionStore};
use tempfile::TempDir;

const ID: &str = "5f2b9c0e4a7d41e8b3c6d9f0a1b2c3d4";

fn setup() -> (TempDir, SessionConfig, FileSessionStore) {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        session_dir: dir.path().join("go_sessions"),
        ..SessionConfig::default()
    };
    let store = FileSessionStore::from_config(&config);
    (dir, config, store)
}

fn form_post(cookie: Option<&str>, body: &str) -> CgiRequest {
    CgiRequest {
        method: "POST".to_string(),
        content_type: "application/x-www-form-urlencoded".to_string(),
        cookie_header: cookie.map(|id| format!("GOSESSID={id}")).unwrap_or_default(),
        body: body.as_bytes().to_vec(),
        ..Default::default()
    }
}

fn set_cookie(response: &Response) -> &str {
    response.header("Set-Cookie").expect("Set-Cookie header")
}

#[tokio::test]
async fn fresh_visit_gets_new_session_cookie() {
    let (_dir, config, store) = setup();
    let request = CgiRequest {
        method: "GET".to_string(),
        ..Default::default()
    };

    let response = handle(&request, &store, &config).await.unwrap();
    let output = response.to_cgi_string();

    let cookie = set_cookie(&response);
    let id = cookie
        .strip_prefix("GOSESSID=")
        .and_then(|rest| rest.strip_suffix("; Path=/; Max-Age=1800"))
        .unwrap();
    assert_eq!(id.len(), 32);
    assert!(is_valid_session_id(id));
    assert!(output.starts_with("Cache-Control: no-cache\nSet-Cookie: GOSESSID="));
    assert!(output.contains("\nContent-Type: text/html\n\n<!DOCTYPE html>"));
    assert!(!output.contains("Saved Data"));
    assert!(!store.session_path(id).exists());
}

#[tokio::test]
async fn save_persists_and_renders_fields() {
    let (_dir, config, store) = setup();
    let request = form_post(Some(ID), "action=save&name=Ada&message=Hello");

    let response = handle(&request, &store, &config).await.unwrap();

    let raw = std::fs::read_to_string(store.session_path(ID)).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored, serde_json::json!({"name": "Ada", "message": "Hello"}));
    assert!(response.body.contains("<p>Name: Ada</p>"));
    assert!(response.body.contains("<p>Message: Hello</p>"));
    assert!(response.body.contains("<p><strong>Data saved!</strong></p>"));
    assert_eq!(set_cookie(&response), format!("GOSESSID={ID}; Path=/; Max-Age=1800"));
}

#[tokio::test]
async fn json_body_is_accepted() {
    let (_dir, config, store) = setup();
    let request = CgiRequest {
        method: "POST".to_string(),
        content_type: "application/json".to_string(),
        cookie_header: format!("GOSESSID={ID}"),
        body: br#"{"action":"save","name":"Ada","message":"from json"}"#.to_vec(),
        ..Default::default()
    };

    handle(&request, &store, &config).await.unwrap();

    let stored = store.load(ID).await.unwrap();
    assert_eq!(stored.get("message").map(String::as_str), Some("from json"));
}

#[tokio::test]
async fn markup_in_fields_is_escaped() {
    let (_dir, config, store) = setup();
    let request = form_post(Some(ID), "action=save&name=%3Cscript%3E");

    let response = handle(&request, &store, &config).await.unwrap();

    assert!(response.body.contains("&lt;script&gt;"));
    assert!(!response.body.contains("<script>"));
    // Stored as submitted; escaping happens on output only.
    assert_eq!(store.load(ID).await.unwrap()["name"], "<script>");
}

#[tokio::test]
async fn clear_deletes_session_file() {
    let (_dir, config, store) = setup();
    let mut data = SessionData::new();
    data.insert("name".to_string(), "Ada".to_string());
    data.insert("message".to_string(), "Hello".to_string());
    store.save(ID, &data).await.unwrap();
    assert!(store.session_path(ID).exists());

    let response = handle(&form_post(Some(ID), "action=clear"), &store, &config)
        .await
        .unwrap();

    assert!(!store.session_path(ID).exists());
    assert!(!response.body.contains("Saved Data"));
    assert!(response.body.contains("<p><strong>Session data cleared!</strong></p>"));
}

#[tokio::test]
async fn session_survives_across_requests() {
    let (_dir, config, store) = setup();

    handle(&form_post(Some(ID), "action=save&name=Ada"), &store, &config)
        .await
        .unwrap();
    handle(&form_post(Some(ID), "action=save&message=Hello"), &store, &config)
        .await
        .unwrap();

    let request = CgiRequest {
        method: "GET".to_string(),
        cookie_header: format!("GOSESSID={ID}"),
        ..Default::default()
    };
    let response = handle(&request, &store, &config).await.unwrap();

    assert!(response.body.contains("<p>Name: Ada</p>"));
    assert!(response.body.contains("<p>Message: Hello</p>"));
    assert!(!response.body.contains("<strong>"));
}

#[tokio::test]
async fn corrupt_session_file_renders_as_empty() {
    let (_dir, config, store) = setup();
    std::fs::create_dir_all(&config.session_dir).unwrap();
    std::fs::write(store.session_path(ID), "not json at all").unwrap();

    let request = CgiRequest {
        cookie_header: format!("GOSESSID={ID}"),
        ..Default::default()
    };
    let response = handle(&request, &store, &config).await.unwrap();

    assert!(!response.body.contains("Saved Data"));
}
