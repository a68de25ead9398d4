//! Client configuration.
//!
//! [`ClientConfig`] holds the server URL and connection tuning. It can be
//! built in code or loaded from a JSON file with `BAYEUX_*` environment
//! variable overrides applied on top.

// Rust guideline compliant 2026-02

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::http::Uri;

use crate::constants::{
    DEFAULT_BACKOFF_INCREMENT_MS, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_BACKOFF_MS,
};
use crate::error::ConfigError;

/// Configuration for a [`BayeuxClient`](crate::BayeuxClient).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Server URL. Only host, port and path are used; the scheme is replaced.
    pub url: String,
    /// Dial `wss://` instead of `ws://`.
    pub force_secure: bool,
    /// Dial retry delay growth per failed attempt, in milliseconds.
    pub backoff_increment_ms: u64,
    /// Dial retry delay ceiling, in milliseconds.
    pub max_backoff_ms: u64,
    /// Append the message type to the URL. Only meaningful for HTTP
    /// transports; accepted and ignored by the WebSocket transport.
    pub append_message_type_to_url: bool,
    /// `advice.timeout` sent with every `/meta/connect`, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            force_secure: false,
            backoff_increment_ms: DEFAULT_BACKOFF_INCREMENT_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            append_message_type_to_url: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    /// Default configuration for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Use `wss://`.
    #[must_use]
    pub fn force_secure(mut self, secure: bool) -> Self {
        self.force_secure = secure;
        self
    }

    /// Set the dial backoff increment and ceiling, in milliseconds.
    #[must_use]
    pub fn backoff(mut self, increment_ms: u64, max_ms: u64) -> Self {
        self.backoff_increment_ms = increment_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    /// Set the connect advice timeout, in milliseconds.
    #[must_use]
    pub fn connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    /// Set whether the message type is appended to the URL.
    #[must_use]
    pub fn append_message_type_to_url(mut self, append: bool) -> Self {
        self.append_message_type_to_url = append;
        self
    }

    /// The URL the WebSocket transport dials: `ws://` or `wss://` followed by
    /// the configured host, optional port and path.
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        let uri = self.url.parse::<Uri>().map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        let host = uri.host().ok_or_else(|| ConfigError::MissingHost {
            url: self.url.clone(),
        })?;

        let scheme = if self.force_secure { "wss://" } else { "ws://" };
        let endpoint = match uri.port_u16() {
            Some(port) => format!("{scheme}{host}:{port}{}", uri.path()),
            None => format!("{scheme}{host}{}", uri.path()),
        };
        Ok(endpoint)
    }

    /// Load configuration from `path` (JSON), or start from the defaults when
    /// no path is given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `BAYEUX_*` overrides from `lookup`. Unparseable numbers and
    /// booleans are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BAYEUX_URL") {
            self.url = url;
        }

        if let Some(secure) = lookup("BAYEUX_FORCE_SECURE") {
            match secure.as_str() {
                "1" | "true" => self.force_secure = true,
                "0" | "false" => self.force_secure = false,
                other => log::warn!("[Bayeux] Ignoring BAYEUX_FORCE_SECURE={}", other),
            }
        }

        if let Some(increment) = lookup("BAYEUX_BACKOFF_INCREMENT_MS") {
            if let Ok(ms) = increment.parse::<u64>() {
                self.backoff_increment_ms = ms;
            }
        }

        if let Some(max) = lookup("BAYEUX_MAX_BACKOFF_MS") {
            if let Ok(ms) = max.parse::<u64>() {
                self.max_backoff_ms = ms;
            }
        }

        if let Some(timeout) = lookup("BAYEUX_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                self.connect_timeout_ms = ms;
            }
        }
    }
}
