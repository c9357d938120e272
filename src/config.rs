//! Configuration types for remove.bg requests and host integration

use crate::error::{RemoveBgError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted for the API key
pub const API_KEY_ENV: &str = "REMOVEBG_API_KEY";

/// Host configuration key holding the API key
pub const API_KEY_CONFIG_KEY: &str = "removebg.api_key";

/// How the processed image is delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnFormat {
    /// Binary image bytes in the response body
    #[default]
    Raw,
    /// JSON body carrying `data.result_b64`
    Base64,
}

impl std::fmt::Display for ReturnFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Base64 => write!(f, "base64"),
        }
    }
}

/// Transport-level request behavior.
///
/// Every field is optional so option sets can be layered with [`RequestOptions::merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Total request timeout
    pub timeout: Option<Duration>,

    /// TCP/TLS connect timeout
    pub connect_timeout: Option<Duration>,

    /// Treat every status >= 400 as an error instead of only 4xx
    pub http_errors: Option<bool>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Enable or disable the strict (>= 400) error policy
    pub fn with_http_errors(mut self, enabled: bool) -> Self {
        self.http_errors = Some(enabled);
        self
    }

    /// Layer `other` on top of `self`; values set in `other` win
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            timeout: other.timeout.or(self.timeout),
            connect_timeout: other.connect_timeout.or(self.connect_timeout),
            http_errors: other.http_errors.or(self.http_errors),
        }
    }

    /// Whether 5xx responses count as errors
    #[must_use]
    pub fn strict_http_errors(&self) -> bool {
        self.http_errors.unwrap_or(false)
    }
}

/// The `removebg` section of a host configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveBgSection {
    /// API key used when the caller does not pass one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Endpoint override, e.g. for a proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Settings a hosting application provides to the client factory.
///
/// On disk this is JSON shaped as `{"removebg": {"api_key": "..."}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub removebg: RemoveBgSection,
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host config holding only an API key
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            removebg: RemoveBgSection {
                api_key: Some(api_key.into()),
                ..RemoveBgSection::default()
            },
        }
    }

    /// Default location: `<config dir>/removebg/config.json`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("removebg").join("config.json"))
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RemoveBgError::configuration(format!("Invalid host configuration: {e}")))
    }

    /// Read a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RemoveBgError::file_io_error("read configuration", path, &e))?;
        Self::from_json_str(&contents).map_err(|e| {
            RemoveBgError::configuration(format!("{} ({})", e, path.display()))
        })
    }

    /// Configuration built from the process environment only
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Load the default config file when present, then apply environment overrides
    pub fn load() -> Result<Self> {
        let base = match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "Loading host configuration");
                Self::from_file(path)?
            },
            _ => Self::default(),
        };
        Ok(base.apply_env(|key| std::env::var(key).ok()))
    }

    /// Override values from an environment lookup
    #[must_use]
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.removebg.api_key = Some(key);
        }
        self
    }

    /// Dotted-key lookup, e.g. `removebg.api_key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            API_KEY_CONFIG_KEY => self.removebg.api_key.as_deref(),
            "removebg.endpoint" => self.removebg.endpoint.as_deref(),
            _ => key
                .strip_prefix("removebg.headers.")
                .and_then(|name| self.removebg.headers.get(name))
                .map(String::as_str),
        }
    }
}

/// Arguments accepted by the client factory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Explicit API key; falls back to `removebg.api_key`
    pub api_key: Option<String>,

    /// Explicit default headers; falls back to the host headers
    pub headers: Option<BTreeMap<String, String>>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = Some(
            headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}
