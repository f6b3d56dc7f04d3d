//! Configuration loading and management.
//!
//! Loads configuration from `./config.toml` (or `$PERSONA_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.
//!
//! Configuration is read once at process start and handed to the
//! components that need it. Nothing here is global.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

// ── Top-level config ────────────────────────────────────────────

/// Top-level service configuration loaded from TOML.
///
/// Path: `./config.toml` or `$PERSONA_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings (`[server]`).
    pub server: ServerConfig,
    /// Completion provider settings (`[llm]`).
    pub llm: LlmConfig,
    /// Best-effort tracing side channel (`[telemetry]`).
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$PERSONA_CONFIG_PATH` or `./config.toml`.
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

    /// Load from TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(AppConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve config file path.
    fn config_path() -> PathBuf {
        Self::config_path_with(|key| std::env::var(key).ok())
    }

    /// Resolve config path using a custom env resolver.
    ///
    /// Checks `$PERSONA_CONFIG_PATH` first, then `./config.toml`.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        match env("PERSONA_CONFIG_PATH") {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from("config.toml"),
        }
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests never touch the process env.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Server.
        if let Some(v) = env("PERSONA_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = env("PERSONA_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Some(v) = env("PERSONA_LOGS_DIR") {
            self.server.logs_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env("PERSONA_POLL_INTERVAL_MS") {
            match v.parse() {
                Ok(n) => self.server.poll_interval_ms = n,
                Err(_) => tracing::warn!(
                    var = "PERSONA_POLL_INTERVAL_MS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        // LLM.
        if let Some(v) = env("OPENAI_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = env("PERSONA_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env("PERSONA_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = env("PERSONA_TEMPERATURE") {
            match v.parse() {
                Ok(t) => self.llm.temperature = t,
                Err(_) => tracing::warn!(
                    var = "PERSONA_TEMPERATURE",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        // Telemetry.
        if let Some(v) = env("LANGFUSE_PUBLIC_KEY") {
            self.telemetry.public_key = Some(v);
        }
        if let Some(v) = env("LANGFUSE_SECRET_KEY") {
            self.telemetry.secret_key = Some(v);
        }
        if let Some(v) = env("LANGFUSE_HOST") {
            self.telemetry.host = v;
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid config TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

// ── Server config ───────────────────────────────────────────────

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    /// Tracing log level filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory for rotated JSON logs. Console-only when unset.
    pub logs_dir: Option<PathBuf>,
    /// Relay drain-loop poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl ServerConfig {
    /// Relay poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_owned(),
            log_level: "info".to_owned(),
            logs_dir: None,
            poll_interval_ms: 100,
        }
    }
}

// ── LLM config ──────────────────────────────────────────────────

/// Completion provider configuration (OpenAI-compatible endpoint).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL (without the `/chat/completions` suffix).
    pub base_url: String,
    /// API key. Required to serve requests.
    pub api_key: Option<String>,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_owned(),
            api_key: None,
            model: "gpt-5-nano".to_owned(),
            temperature: 0.8,
            request_timeout_secs: 120,
        }
    }
}

// ── Telemetry config ────────────────────────────────────────────

/// Langfuse-compatible tracing endpoint. Enabled only when both keys are set.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Ingestion host.
    pub host: String,
    /// Public key.
    pub public_key: Option<String>,
    /// Secret key.
    pub secret_key: Option<String>,
}

impl TelemetryConfig {
    /// Whether both keys are configured.
    pub fn is_enabled(&self) -> bool {
        matches!(
            (&self.public_key, &self.secret_key),
            (Some(public), Some(secret)) if !public.is_empty() && !secret.is_empty()
        )
    }
}

impl std::fmt::Debug for TelemetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryConfig")
            .field("host", &self.host)
            .field("public_key", &self.public_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "https://cloud.langfuse.com".to_owned(),
            public_key: None,
            secret_key: None,
        }
    }
}
