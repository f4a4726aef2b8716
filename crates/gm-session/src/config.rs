//! Session and correlation settings.
//!
//! Read from a TOML file, then overridden by `GM_ENDPOINT` / `GM_TIMEOUT_MS`,
//! then by whatever the caller sets explicitly.

use std::path::Path;
use std::time::Duration;

use gm_core::{AddressingScheme, CoreError, Correlator, DEFAULT_COLUMNS, DEFAULT_ROWS};
use serde::Deserialize;

use crate::error::{Result, SessionError};

/// Application-level WebSocket sub-protocol spoken by the graph store.
pub const DEFAULT_SUBPROTOCOL: &str = "gm-graph.v1";

pub const DEFAULT_TIMEOUT_MS: u64 = 8_000;

pub const ENDPOINT_ENV: &str = "GM_ENDPOINT";
pub const TIMEOUT_ENV: &str = "GM_TIMEOUT_MS";

/// Everything a [`crate::GraphSession`] needs to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub endpoint: String,
    pub subprotocol: String,
    pub request_timeout: Duration,
}

impl SessionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            subprotocol: DEFAULT_SUBPROTOCOL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = subprotocol.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub subprotocol: String,
    pub request_timeout_ms: u64,
    pub rows: u32,
    pub columns: u32,
    pub scheme: AddressingScheme,
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: None,
            subprotocol: DEFAULT_SUBPROTOCOL.to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            scheme: AddressingScheme::Derived,
            workers: 1,
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Apply `GM_ENDPOINT` and `GM_TIMEOUT_MS` from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source. Unparseable timeouts are
    /// ignored with a warning.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.trim().is_empty()) {
            self.endpoint = Some(endpoint);
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.request_timeout_ms = ms,
                Err(_) => tracing::warn!("ignoring {TIMEOUT_ENV}={raw:?}: not a number"),
            }
        }
        self
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| SessionError::Config("no endpoint configured".to_string()))?;
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(SessionError::Config(format!(
                "endpoint must be a ws:// or wss:// URL, got {endpoint:?}"
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(SessionError::Config("request_timeout_ms must be positive".to_string()));
        }
        Ok(SessionConfig::new(endpoint)
            .with_subprotocol(self.subprotocol.clone())
            .with_timeout(Duration::from_millis(self.request_timeout_ms)))
    }

    pub fn correlator(&self) -> std::result::Result<Correlator, CoreError> {
        Ok(Correlator::with_grid(self.rows, self.columns)?
            .with_scheme(self.scheme)
            .with_workers(self.workers))
    }
}
