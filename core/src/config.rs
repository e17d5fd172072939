use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const APP_NAME: &str = "statekeeper";

pub const DEFAULT_SESSION_DIR: &str = "/tmp/go_sessions";
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_COOKIE_NAME: &str = "GOSESSID";
pub const DEFAULT_FORM_ACTION: &str = "/hw2/go/state-go.cgi";
pub const DEFAULT_PAGE_TITLE: &str = "Rust";

/// Number of random bytes in a session identifier (hex-encoded to twice as many chars).
pub const SESSION_ID_BYTES: usize = 16;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "STATEKEEPER_CONFIG";

const SESSION_DIR_ENV: &str = "STATEKEEPER_SESSION_DIR";
const TIMEOUT_ENV: &str = "STATEKEEPER_TIMEOUT";
const COOKIE_ENV: &str = "STATEKEEPER_COOKIE";
const ID_POLICY_ENV: &str = "STATEKEEPER_ID_POLICY";
const FORM_ACTION_ENV: &str = "STATEKEEPER_FORM_ACTION";

/// How a client-supplied session identifier is treated before it is used as a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdPolicy {
    /// Any non-empty cookie value is used verbatim.
    Legacy,
    /// Only identifiers shaped like generated ones (32 lowercase hex chars) are accepted.
    #[default]
    Strict,
}

impl FromStr for IdPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(IdPolicy::Legacy),
            "strict" => Ok(IdPolicy::Strict),
            _ => Err(ConfigError::InvalidValue {
                key: "id_policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for IdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdPolicy::Legacy => write!(f, "legacy"),
            IdPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// Configuration for the session store and the CGI front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding one `sess_<id>` file per session
    pub session_dir: PathBuf,
    /// Seconds since last modification after which a session is expired
    pub timeout_secs: u64,
    /// Name of the cookie carrying the session identifier
    pub cookie_name: String,
    pub id_policy: IdPolicy,
    /// URL the rendered forms post back to
    pub form_action: String,
    pub page_title: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            id_policy: IdPolicy::default(),
            form_action: DEFAULT_FORM_ACTION.to_string(),
            page_title: DEFAULT_PAGE_TITLE.to_string(),
        }
    }
}

impl SessionConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if !is_valid_cookie_name(&config.cookie_name) {
            return Err(ConfigError::InvalidValue {
                key: "cookie_name".to_string(),
                value: config.cookie_name,
            });
        }

        Ok(config)
    }

    /// Resolves the effective configuration from the process environment.
    ///
    /// An explicit path wins over `STATEKEEPER_CONFIG`, which wins over
    /// `~/.config/statekeeper/config.toml`. Environment overrides are applied last.
    pub fn resolve(explicit: Option<&Path>) -> ConfigResult<Self> {
        Self::resolve_with(explicit, |key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::resolve`] with an injectable environment lookup.
    pub fn resolve_with<F>(explicit: Option<&Path>, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => match lookup(CONFIG_PATH_ENV) {
                Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
                _ => get_default_config_file(APP_NAME).ok(),
            },
        };

        let config = match path {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        Ok(config.apply_env_with(lookup))
    }

    /// Applies `STATEKEEPER_*` overrides. Unparseable values are ignored with a warning.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(SESSION_DIR_ENV).filter(|v| !v.is_empty()) {
            self.session_dir = PathBuf::from(dir);
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => warn!(key = TIMEOUT_ENV, value = %raw, "Ignoring invalid timeout"),
            }
        }

        if let Some(name) = lookup(COOKIE_ENV) {
            if is_valid_cookie_name(&name) {
                self.cookie_name = name;
            } else {
                warn!(key = COOKIE_ENV, value = %name, "Ignoring invalid cookie name");
            }
        }

        if let Some(raw) = lookup(ID_POLICY_ENV) {
            match raw.parse::<IdPolicy>() {
                Ok(policy) => self.id_policy = policy,
                Err(e) => warn!(key = ID_POLICY_ENV, error = %e, "Ignoring id policy override"),
            }
        }

        if let Some(action) = lookup(FORM_ACTION_ENV).filter(|v| !v.is_empty()) {
            self.form_action = action;
        }

        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// RFC 6265 token: visible ASCII minus separators.
fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> ConfigResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> ConfigResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = SessionConfig::default();
        assert_eq!(config.session_dir, PathBuf::from("/tmp/go_sessions"));
        assert_eq!(config.timeout_secs, 1800);
        assert_eq!(config.timeout(), Duration::from_secs(1800));
        assert_eq!(config.cookie_name, "GOSESSID");
        assert_eq!(config.id_policy, IdPolicy::Strict);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::load_from_file(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs = 60").unwrap();
        writeln!(file, "id_policy = \"legacy\"").unwrap();

        let config = SessionConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.id_policy, IdPolicy::Legacy);
        assert_eq!(config.cookie_name, DEFAULT_COOKIE_NAME);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs = \"soon\"").unwrap();

        let result = SessionConfig::load_from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_invalid_cookie_name_in_file_is_an_error() {
        for name in ["", "bad;name", "has space"] {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "cookie_name = \"{name}\"").unwrap();

            let result = SessionConfig::load_from_file(file.path());
            assert!(
                matches!(&result, Err(ConfigError::InvalidValue { key, .. }) if key == "cookie_name"),
                "cookie_name {name:?} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "session_dir = \"/var/lib/sessions\"").unwrap();
        writeln!(file, "cookie_name = \"SID\"").unwrap();

        let lookup = env_from(&[
            ("STATEKEEPER_SESSION_DIR", "/srv/sessions"),
            ("STATEKEEPER_TIMEOUT", "90"),
        ]);
        let config = SessionConfig::resolve_with(Some(file.path()), lookup).unwrap();

        assert_eq!(config.session_dir, PathBuf::from("/srv/sessions"));
        assert_eq!(config.timeout_secs, 90);
        assert_eq!(config.cookie_name, "SID");
    }

    #[test]
    fn test_config_path_from_env() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "page_title = \"Env\"").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config =
            SessionConfig::resolve_with(None, env_from(&[(CONFIG_PATH_ENV, path.as_str())])).unwrap();
        assert_eq!(config.page_title, "Env");
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let config = SessionConfig::default().apply_env_with(env_from(&[
            ("STATEKEEPER_TIMEOUT", "half an hour"),
            ("STATEKEEPER_COOKIE", "bad;name"),
            ("STATEKEEPER_ID_POLICY", "lenient"),
        ]));
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_id_policy_parsing() {
        assert_eq!("LEGACY".parse::<IdPolicy>().unwrap(), IdPolicy::Legacy);
        assert_eq!(" strict ".parse::<IdPolicy>().unwrap(), IdPolicy::Strict);
        assert!("other".parse::<IdPolicy>().is_err());
        assert_eq!(IdPolicy::Legacy.to_string(), "legacy");
    }
}
