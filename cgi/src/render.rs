//! CGI response headers and the HTML page.

use std::fmt::Write as _;

use statekeeper_session::SessionData;

/// A complete CGI response: header lines, a blank line, then the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn to_cgi_string(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 128);
        for (name, value) in &self.headers {
            let _ = writeln!(out, "{name}: {value}");
        }
        out.push('\n');
        out.push_str(&self.body);
        out
    }
}

/// Headers sent with every page: no caching, and the session cookie refreshed for `max_age_secs`.
pub fn session_headers(cookie_name: &str, session_id: &str, max_age_secs: u64) -> Vec<(String, String)> {
    vec![
        ("Cache-Control".to_string(), "no-cache".to_string()),
        (
            "Set-Cookie".to_string(),
            format!("{cookie_name}={session_id}; Path=/; Max-Age={max_age_secs}"),
        ),
        ("Content-Type".to_string(), "text/html".to_string()),
    ]
}

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Everything the page shows
#[derive(Debug, Clone)]
pub struct PageView<'a> {
    pub title: &'a str,
    pub form_action: &'a str,
    /// One-line status message, e.g. after a save
    pub flash: Option<&'a str>,
    pub data: &'a SessionData,
}

pub fn render_page(view: &PageView<'_>) -> String {
    let title = escape_html(view.title);
    let action = escape_html(view.form_action);
    let field = |key: &str| {
        view.data
            .get(key)
            .map(|v| escape_html(v))
            .unwrap_or_default()
    };
    let name = field("name");
    let message = field("message");

    let mut html = String::new();
    let _ = writeln!(html, "<!DOCTYPE html>");
    let _ = writeln!(html, "<html>");
    let _ = writeln!(html, "<head><title>{title} State Demo</title></head>");
    let _ = writeln!(html, "<body>");
    let _ = writeln!(html, "<h1>{title} State Demo</h1>");

    if let Some(flash) = view.flash {
        let _ = writeln!(html, "<p><strong>{}</strong></p>", escape_html(flash));
    }

    if !name.is_empty() || !message.is_empty() {
        let _ = writeln!(html, "<h3>Saved Data:</h3>");
        if !name.is_empty() {
            let _ = writeln!(html, "<p>Name: {name}</p>");
        }
        if !message.is_empty() {
            let _ = writeln!(html, "<p>Message: {message}</p>");
        }
        let _ = writeln!(html, "<hr>");
    }

    let _ = write!(
        html,
        "<form action='{action}' method='POST'>
<input type='hidden' name='action' value='save'>
<label>Name <input type='text' name='name' value='{name}'></label>
<br><br>
<label>Message <input type='text' name='message' value='{message}'></label>
<br><br>
<button type='submit'>Save</button>
</form>

<br>
<form action='{action}' method='POST'>
<input type='hidden' name='action' value='clear'>
<button type='submit'>Clear Data</button>
</form>

</body>
</html>"
    );

    html
}
