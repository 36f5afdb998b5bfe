//! Configuration loading.
//!
//! Loads `chatbridge.toml` (or `$CHATBRIDGE_CONFIG`). Environment variables
//! override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::backend::connection::{default_intents, DEFAULT_DIAGNOSTIC_BUFFER};
use crate::backend::{ConnectionConfig, Credential, Intent};
use crate::registry::BackendSelection;

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
///
/// Path: `./chatbridge.toml` or `$CHATBRIDGE_CONFIG`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Credential and gateway intents (`[connection]`).
    pub connection: ConnectionSection,
    /// Backend selection and normalizer settings (`[bridge]`).
    pub bridge: BridgeSection,
    /// Logging settings for the binary (`[logging]`).
    pub logging: LoggingSection,
}

impl BridgeConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config file {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve the config path using a custom env resolver.
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("CHATBRIDGE_CONFIG").map_or_else(|| PathBuf::from("chatbridge.toml"), PathBuf::from)
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests never touch the process environment.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("CHATBRIDGE_TOKEN") {
            self.connection.token = Some(v);
        }
        if let Some(v) = env("CHATBRIDGE_INTENTS") {
            let parsed: std::result::Result<BTreeSet<Intent>, String> = v
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(str::parse)
                .collect();
            match parsed {
                Ok(intents) => self.connection.intents = intents,
                Err(error) => tracing::warn!(
                    var = "CHATBRIDGE_INTENTS",
                    value = %v,
                    %error,
                    "ignoring invalid env override"
                ),
            }
        }

        if let Some(v) = env("CHATBRIDGE_BACKEND") {
            self.bridge.backend = BackendSelection::from(v);
        }
        if let Some(v) = env("CHATBRIDGE_TIMEOUT_MS") {
            match v.trim().parse::<u64>() {
                Ok(0) => self.bridge.operation_timeout_ms = None,
                Ok(n) => self.bridge.operation_timeout_ms = Some(n),
                Err(_) => tracing::warn!(
                    var = "CHATBRIDGE_TIMEOUT_MS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        if let Some(v) = env("CHATBRIDGE_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or unknown intents.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Backend selection criteria.
    pub fn selection(&self) -> BackendSelection {
        self.bridge.backend.clone()
    }

    /// Per-operation timeout, `None` when disabled.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.bridge
            .operation_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Runtime connection parameters. A missing token becomes an empty
    /// credential, which backends reject at connect time.
    pub fn connection_config(&self) -> ConnectionConfig {
        let credential = Credential::new(self.connection.token.clone().unwrap_or_default());
        let mut config = ConnectionConfig::new(credential)
            .with_intents(self.connection.intents.iter().copied());
        config.operation_timeout = self.operation_timeout();
        config.diagnostic_buffer = self.bridge.diagnostic_buffer;
        config
    }
}

// ── Sections ────────────────────────────────────────────────────

/// `[connection]`: what the backend authenticates with.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionSection {
    /// Bot token.
    pub token: Option<String>,
    /// Gateway intents to request.
    pub intents: BTreeSet<Intent>,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            token: None,
            intents: default_intents(),
        }
    }
}

impl std::fmt::Debug for ConnectionSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSection")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("intents", &self.intents)
            .finish()
    }
}

/// `[bridge]`: backend selection and normalizer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// `"auto"` or a backend identifier.
    pub backend: BackendSelection,
    /// Per-operation timeout in milliseconds; absent or 0 disables it.
    pub operation_timeout_ms: Option<u64>,
    /// Capacity of the subscriber diagnostic channel.
    pub diagnostic_buffer: usize,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            backend: BackendSelection::Auto,
            operation_timeout_ms: None,
            diagnostic_buffer: DEFAULT_DIAGNOSTIC_BUFFER,
        }
    }
}

/// `[logging]`: used by the binary only.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rotated JSON logs; stderr only when absent.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
