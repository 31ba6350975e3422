//! Application configuration.
//!
//! [`TunesmithConfig`] is a flat, serializable record. It is usually built
//! from defaults plus `TUNESMITH_*` environment variables and then split
//! into the per-layer configs ([`HttpConfig`], [`SessionConfig`],
//! [`TransitionConfig`]).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tunesmith_session::SessionConfig;
use tunesmith_shell::TransitionConfig;
use tunesmith_transport::HttpConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds a value that can't be used.
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunesmithConfig {
    /// Backend base URL; realm prefixes (`/api/users`, `/api/admin`) are
    /// appended to it.
    pub api_base_url: String,
    /// Directory holding one token file per realm.
    pub storage_dir: PathBuf,
    pub request_timeout_ms: u64,
    /// Route-transition window, clamped to 10 s by the shell.
    pub transition_window_ms: u64,
    /// Whether a startup verification that couldn't reach the backend
    /// discards the persisted token.
    pub clear_token_on_unreachable: bool,
}

impl Default for TunesmithConfig {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            api_base_url: http.base_url,
            storage_dir: default_storage_dir(),
            request_timeout_ms: http.request_timeout.as_millis() as u64,
            transition_window_ms: TransitionConfig::default().window.as_millis() as u64,
            clear_token_on_unreachable: SessionConfig::default().clear_token_on_unreachable,
        }
    }
}

impl TunesmithConfig {
    pub const ENV_API_URL: &'static str = "TUNESMITH_API_URL";
    pub const ENV_STORAGE_DIR: &'static str = "TUNESMITH_STORAGE_DIR";
    pub const ENV_REQUEST_TIMEOUT_MS: &'static str = "TUNESMITH_REQUEST_TIMEOUT_MS";
    pub const ENV_TRANSITION_WINDOW_MS: &'static str = "TUNESMITH_TRANSITION_WINDOW_MS";
    pub const ENV_CLEAR_TOKEN_ON_UNREACHABLE: &'static str =
        "TUNESMITH_CLEAR_TOKEN_ON_UNREACHABLE";

    /// Defaults overridden by any `TUNESMITH_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through
    /// `lookup`. Unset and blank values keep the default.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get(Self::ENV_API_URL) {
            config.api_base_url = parse_url(Self::ENV_API_URL, url)?;
        }
        if let Some(dir) = get(Self::ENV_STORAGE_DIR) {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(ms) = get(Self::ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout_ms = parse_millis(Self::ENV_REQUEST_TIMEOUT_MS, ms)?;
            if config.request_timeout_ms == 0 {
                return Err(ConfigError::Invalid {
                    key: Self::ENV_REQUEST_TIMEOUT_MS,
                    value: "0".into(),
                    reason: "timeout must be positive".into(),
                });
            }
        }
        if let Some(ms) = get(Self::ENV_TRANSITION_WINDOW_MS) {
            config.transition_window_ms = parse_millis(Self::ENV_TRANSITION_WINDOW_MS, ms)?;
        }
        if let Some(flag) = get(Self::ENV_CLEAR_TOKEN_ON_UNREACHABLE) {
            config.clear_token_on_unreachable =
                parse_bool(Self::ENV_CLEAR_TOKEN_ON_UNREACHABLE, flag)?;
        }
        Ok(config)
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            base_url: self.api_base_url.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            clear_token_on_unreachable: self.clear_token_on_unreachable,
        }
    }

    pub fn transition_config(&self) -> TransitionConfig {
        TransitionConfig::with_window(Duration::from_millis(self.transition_window_ms))
    }
}

/// Per-user data folder, so tokens persist regardless of the working
/// directory the app is launched from.
fn default_storage_dir() -> PathBuf {
    if cfg!(target_os = "macos") {
        // ~/Library/Application Support/tunesmith
        dirs::data_dir()
            .map(|d| d.join("tunesmith"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tunesmith"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\tunesmith
        dirs::data_local_dir()
            .map(|d| d.join("tunesmith"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tunesmith"))
    } else {
        // ~/.local/share/tunesmith
        dirs::data_local_dir()
            .map(|d| d.join("tunesmith"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/tunesmith"))
    }
}

fn parse_url(key: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected an http:// or https:// URL".into(),
        })
    }
}

fn parse_millis(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        key,
        reason: format!("expected milliseconds ({e})"),
        value,
    })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false".into(),
        }),
    }
}
