//! The inbound side of a CGI request: environment metadata plus body.

use std::collections::BTreeMap;
use std::env;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;
use url::form_urlencoded;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Decoded request fields, first value wins per key
pub type FormFields = BTreeMap<String, String>;

/// Session mutation requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Save,
    Clear,
}

impl Action {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "save" => Some(Action::Save),
            "clear" => Some(Action::Clear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiRequest {
    pub method: String,
    pub query_string: String,
    pub content_type: String,
    pub cookie_header: String,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

impl CgiRequest {
    /// Build a request from the process environment. The body is read separately.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            method: lookup("REQUEST_METHOD").unwrap_or_default(),
            query_string: lookup("QUERY_STRING").unwrap_or_default(),
            content_type: lookup("CONTENT_TYPE").unwrap_or_default(),
            cookie_header: lookup("HTTP_COOKIE").unwrap_or_default(),
            content_length: lookup("CONTENT_LENGTH").and_then(|v| v.trim().parse().ok()),
            body: Vec::new(),
        }
    }

    pub fn is_post(&self) -> bool {
        self.method == "POST"
    }

    /// Read the body from `reader` for POST requests, bounded by `CONTENT_LENGTH` when set.
    pub async fn read_body<R>(&mut self, reader: R) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        if !self.is_post() {
            return Ok(());
        }

        let limit = self.content_length.unwrap_or(u64::MAX);
        let mut body = Vec::new();
        reader.take(limit).read_to_end(&mut body).await?;
        debug!(bytes = body.len(), "Read request body");
        self.body = body;
        Ok(())
    }

    /// Value of the cookie called `name`, if the client sent one.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        find_cookie(&self.cookie_header, name)
    }

    /// Fields from the body, decoded as JSON or URL-encoded according to the content type.
    ///
    /// Only POST bodies are considered. A body that fails to decode yields no fields.
    pub fn form_fields(&self) -> FormFields {
        if !self.is_post() || self.body.is_empty() {
            return FormFields::new();
        }

        if self.content_type.contains(JSON_CONTENT_TYPE) {
            // All-or-nothing: a single non-string value drops every field.
            match serde_json::from_slice::<FormFields>(&self.body) {
                Ok(fields) => fields,
                Err(e) => {
                    debug!(error = %e, "Ignoring malformed JSON body");
                    FormFields::new()
                }
            }
        } else {
            parse_urlencoded(&self.body)
        }
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        form_urlencoded::parse(self.query_string.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// The requested action: the body's `action` field, else the query string's.
    pub fn action(&self, fields: &FormFields) -> Option<Action> {
        let raw = fields
            .get("action")
            .filter(|v| !v.is_empty())
            .cloned()
            .or_else(|| self.query_param("action"))?;
        Action::parse(&raw)
    }
}

/// Find `name` in a `Cookie` header made of `;`-separated `key=value` pairs.
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix(name)?.strip_prefix('='))
}

fn parse_urlencoded(body: &[u8]) -> FormFields {
    let mut fields = FormFields::new();
    for (key, value) in form_urlencoded::parse(body) {
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    fields
}
