//! Client configuration types.
//!
//! Values come from defaults, optionally overridden by `HELPLINE_*`
//! environment variables (see [`ClientConfig::from_env`]).

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{ClientError, Result};

/// Environment variable overriding [`ClientConfig::api_url`].
pub const ENV_API_URL: &str = "HELPLINE_API_URL";
/// Environment variable overriding [`ClientConfig::session_file`].
pub const ENV_SESSION_FILE: &str = "HELPLINE_SESSION_FILE";
/// Environment variable overriding [`ClientConfig::request_timeout_seconds`].
pub const ENV_REQUEST_TIMEOUT: &str = "HELPLINE_REQUEST_TIMEOUT";
/// Environment variable overriding [`ClientConfig::search_debounce_ms`].
pub const ENV_SEARCH_DEBOUNCE_MS: &str = "HELPLINE_SEARCH_DEBOUNCE_MS";

/// Configuration for the API client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// API base URL, including the `/api` prefix.
    #[serde(default = "ClientConfig::default_api_url")]
    pub api_url: String,

    /// Whole-request timeout in seconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout in seconds.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Where the session is persisted between runs.
    #[serde(default = "ClientConfig::default_session_file")]
    pub session_file: PathBuf,

    /// Quiet period before a search is issued, in milliseconds.
    #[serde(default = "ClientConfig::default_search_debounce")]
    pub search_debounce_ms: u64,
}

impl ClientConfig {
    fn default_api_url() -> String {
        "http://localhost:8001/api".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    fn default_session_file() -> PathBuf {
        std::env::var_os("HOME")
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
            .join(".config")
            .join("helpline")
            .join("session.json")
    }

    const fn default_search_debounce() -> u64 {
        300
    }

    /// Build a configuration from defaults and `HELPLINE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if a numeric variable does not parse or
    /// the resulting API URL is invalid.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(path) = std::env::var_os(ENV_SESSION_FILE) {
            config.session_file = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var(ENV_REQUEST_TIMEOUT) {
            config.request_timeout_seconds = parse_env_number(ENV_REQUEST_TIMEOUT, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_SEARCH_DEBOUNCE_MS) {
            config.search_debounce_ms = parse_env_number(ENV_SEARCH_DEBOUNCE_MS, &raw)?;
        }

        config.base_url()?;
        Ok(config)
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Override the session file location.
    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Parse [`Self::api_url`].
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the URL is malformed or cannot carry
    /// path segments.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(self.api_url.trim())
            .map_err(|e| ClientError::Config(format!("api_url '{}': {e}", self.api_url)))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "api_url '{}' cannot be used as a base URL",
                self.api_url
            )));
        }
        Ok(url)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the search debounce window as a `Duration`.
    #[must_use]
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Self::default_api_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            session_file: Self::default_session_file(),
            search_debounce_ms: Self::default_search_debounce(),
        }
    }
}

fn parse_env_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| ClientError::Config(format!("{name} must be a whole number, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8001/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert!(config.session_file.ends_with("helpline/session.json"));
    }

    #[test]
    fn deserialize_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"api_url": "https://helpline.example.org/api"}"#).unwrap();
        assert_eq!(config.api_url, "https://helpline.example.org/api");
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.search_debounce_ms, 300);
    }

    #[test]
    fn base_url_validation() {
        assert!(ClientConfig::default().base_url().is_ok());
        assert!(matches!(
            ClientConfig::default().with_api_url("not a url").base_url(),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::default()
                .with_api_url("mailto:ops@example.org")
                .base_url(),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn env_number_parsing() {
        assert_eq!(parse_env_number("X", " 45 ").unwrap(), 45);
        assert!(matches!(
            parse_env_number("X", "soon"),
            Err(ClientError::Config(msg)) if msg.contains("X must be")
        ));
    }
}
