//! Configuration management for docchat services.
//!
//! The configuration file lives at `~/.docchat/config.json`. Every field has a
//! default, so the file is optional.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `GROQ_API_KEY` → secrets.groq_api_key
//! - `DOCCHAT_BIND_ADDRESS` → network.bind
//! - `DOCCHAT_PORT` → network.port
//! - `DOCCHAT_ALLOWED_ORIGIN` → cors.allowed_origin
//! - `DOCCHAT_MODEL` → llm.model
//! - `DOCCHAT_LOG_LEVEL` → observability.log_level
//! - `DOCCHAT_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".docchat"),
        |dirs| dirs.home_dir().join(".docchat"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address. Default: "0.0.0.0"
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port. Default: 8000
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

/// Cross-origin configuration. Exactly one browser origin is allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: default_allowed_origin(),
        }
    }
}

fn default_allowed_origin() -> String {
    "http://localhost:3000".into()
}

// ============================================================================
// LLM Configuration
// ============================================================================

/// Completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier sent with every completion request
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible base URL (without the `/v1/chat/completions` suffix)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".into()
}

fn default_base_url() -> String {
    "https://api.groq.com/openai".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> i64 {
    2048
}

// ============================================================================
// Document Configuration
// ============================================================================

/// Uploaded document handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Number of characters of document context injected into a prompt
    #[serde(default = "default_context_budget")]
    pub context_budget_chars: usize,

    /// Largest accepted upload body in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            context_budget_chars: default_context_budget(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_context_budget() -> usize {
    3000
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

// ============================================================================
// Secrets / Observability
// ============================================================================

/// Credentials. Usually supplied through the environment only.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groq_api_key: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub document: DocumentConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply process environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GROQ_API_KEY").filter(|k| !k.is_empty()) {
            self.secrets.groq_api_key = Some(key);
        }

        if let Some(bind) = lookup("DOCCHAT_BIND_ADDRESS") {
            self.network.bind = bind;
        }
        if let Some(port) = lookup("DOCCHAT_PORT") {
            match port.parse() {
                Ok(p) => self.network.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid DOCCHAT_PORT"),
            }
        }

        if let Some(origin) = lookup("DOCCHAT_ALLOWED_ORIGIN") {
            self.cors.allowed_origin = origin;
        }

        if let Some(model) = lookup("DOCCHAT_MODEL") {
            self.llm.model = model;
        }

        if let Some(level) = lookup("DOCCHAT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("DOCCHAT_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// The provider credential. The service refuses to start without it.
    pub fn groq_api_key(&self) -> crate::Result<&str> {
        self.secrets
            .groq_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                crate::Error::Config("GROQ_API_KEY not found in environment variables".into())
            })
    }

    /// Socket address for the listener.
    pub fn listen_address(&self) -> crate::Result<SocketAddr> {
        let ip: IpAddr = self.network.bind.parse().map_err(|_| {
            crate::Error::Config(format!("Invalid bind address: {}", self.network.bind))
        })?;
        Ok(SocketAddr::new(ip, self.network.port))
    }
}
