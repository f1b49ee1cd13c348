//! Configuration file parser for ~/.config/bitscroll/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each one
//! since they are usually typos.
use crate::util::{validate_base_url, UrlValidationError};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the upstream API key. Takes precedence over
/// the config file.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8788";
pub const DEFAULT_UPSTREAM_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_PROXY_MODEL: &str = "google/gemini-2.5-flash-lite-preview-09-2025";
pub const DEFAULT_ALLOWED_DOMAIN: &str = "infinitebitcointext.com";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid api_base_url: {0}")]
    InvalidBaseUrl(#[from] UrlValidationError),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration. Any subset of keys may be given.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the proxy; `/openrouter` is appended.
    pub api_base_url: String,

    /// Model named in client requests. The proxy replaces it.
    pub model: String,

    pub temperature: f32,

    pub tree_temperature: f32,

    /// Floor on how long the loading line stays visible, in milliseconds.
    pub min_loading_ms: u64,

    /// Number of trailing section topics sent as "recent".
    pub recent_topic_window: usize,

    /// Start loading the next section once the viewport is this many rows
    /// from the end of the feed.
    pub lookahead_lines: usize,

    pub request_timeout_secs: u64,

    /// Theme variant name ("dark" or "light").
    pub theme: String,

    /// Custom keybinding overrides. Keys are action names, values are key strings.
    pub keybindings: HashMap<String, String>,

    pub proxy: ProxyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model: crate::generation::DEFAULT_MODEL.to_string(),
            temperature: crate::generation::DEFAULT_TEMPERATURE,
            tree_temperature: crate::generation::DEFAULT_TREE_TEMPERATURE,
            min_loading_ms: 800,
            recent_topic_window: crate::controller::RECENT_TOPIC_WINDOW,
            lookahead_lines: 12,
            request_timeout_secs: 60,
            theme: "dark".to_string(),
            keybindings: HashMap::new(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("tree_temperature", &self.tree_temperature)
            .field("min_loading_ms", &self.min_loading_ms)
            .field("recent_topic_window", &self.recent_topic_window)
            .field("lookahead_lines", &self.lookahead_lines)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("theme", &self.theme)
            .field("keybindings", &self.keybindings)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// `[proxy]` table: settings for `bitscroll proxy`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Socket address to listen on.
    pub bind: String,

    pub upstream_url: String,

    /// Model forced into every forwarded request.
    pub model: String,

    /// Production domain accepted in Origin/Referer in addition to localhost.
    pub allowed_domain: String,

    /// `Access-Control-Allow-Origin` for non-local requests. `*` when unset.
    pub cors_allow_origin: Option<String>,

    /// Upstream API key (alternative to the OPENROUTER_API_KEY env var).
    /// The env var takes precedence.
    pub openrouter_api_key: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8788".to_string(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_PROXY_MODEL.to_string(),
            allowed_domain: DEFAULT_ALLOWED_DOMAIN.to_string(),
            cors_allow_origin: None,
            openrouter_api_key: None,
        }
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("bind", &self.bind)
            .field("upstream_url", &self.upstream_url)
            .field("model", &self.model)
            .field("allowed_domain", &self.allowed_domain)
            .field("cors_allow_origin", &self.cors_allow_origin)
            .field(
                "openrouter_api_key",
                &self.openrouter_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl ProxyConfig {
    /// The API key to use: the env var if set and non-empty, else the file.
    pub fn api_key(&self) -> Option<SecretString> {
        self.api_key_from(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_from(&self, env_value: Option<String>) -> Option<SecretString> {
        env_value
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.openrouter_api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
            })
            .map(|k| SecretString::from(k.trim().to_string()))
    }
}

const KNOWN_KEYS: [&str; 11] = [
    "api_base_url",
    "model",
    "temperature",
    "tree_temperature",
    "min_loading_ms",
    "recent_topic_window",
    "lookahead_lines",
    "request_timeout_secs",
    "theme",
    "keybindings",
    "proxy",
];

const KNOWN_PROXY_KEYS: [&str; 6] = [
    "bind",
    "upstream_url",
    "model",
    "allowed_domain",
    "cors_allow_origin",
    "openrouter_api_key",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// `~/.config/bitscroll`, or `None` without a home directory.
    pub fn dir() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("bitscroll"))
    }

    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Out-of-range values → `Err(ConfigError::InvalidValue)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), api_base_url = %config.api_base_url, "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let mut config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the API base URL (from `--api-base`), validating it.
    pub fn set_api_base_url(&mut self, raw: &str) -> Result<(), ConfigError> {
        self.api_base_url = validate_base_url(raw)?;
        Ok(())
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        self.api_base_url = validate_base_url(&self.api_base_url)?;

        for (key, value) in [
            ("temperature", self.temperature),
            ("tree_temperature", self.tree_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: format!("{} is outside 0.0..=2.0", value),
                });
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.proxy.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "proxy.bind",
                reason: format!("'{}' is not a socket address", self.proxy.bind),
            });
        }

        Ok(())
    }

    pub fn min_loading(&self) -> Duration {
        Duration::from_millis(self.min_loading_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for key in raw.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
    if let Some(proxy) = raw.get("proxy").and_then(toml::Value::as_table) {
        for key in proxy.keys() {
            if !KNOWN_PROXY_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in [proxy] config, ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
