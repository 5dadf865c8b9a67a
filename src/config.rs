//! Configuration management for Raidscope
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, RaidscopeError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Placeholder substituted with the transport diagnostic in error messages.
pub const ERROR_MESSAGE_PLACEHOLDER: &str = "{message}";

/// Main configuration structure for Raidscope
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Analysis service endpoints and timeouts
    #[serde(default)]
    pub api: ApiConfig,
    /// Chat session behaviour
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Analysis service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the raid analytics backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the streaming analyze endpoint
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Path of the non-streaming analyze endpoint
    #[serde(default = "default_analyze_path")]
    pub analyze_path: String,

    /// Timeout for establishing the TCP/TLS connection (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Whole-request timeout for the non-streaming endpoint (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Longest silence tolerated on an open stream (seconds, 0 disables)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_stream_path() -> String {
    "/api/analyze/stream".to_string()
}

fn default_analyze_path() -> String {
    "/api/analyze".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

fn default_idle_timeout() -> u64 {
    120
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            analyze_path: default_analyze_path(),
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_request_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl ApiConfig {
    /// Full URL of the streaming analyze endpoint
    ///
    /// # Examples
    ///
    /// ```
    /// use raidscope::config::ApiConfig;
    ///
    /// let api = ApiConfig {
    ///     base_url: "http://raids.local:8000/".to_string(),
    ///     ..ApiConfig::default()
    /// };
    /// assert_eq!(
    ///     api.stream_url().unwrap().as_str(),
    ///     "http://raids.local:8000/api/analyze/stream"
    /// );
    /// ```
    pub fn stream_url(&self) -> Result<Url> {
        join_endpoint(&self.base_url, &self.stream_path)
    }

    /// Full URL of the non-streaming analyze endpoint
    pub fn analyze_url(&self) -> Result<Url> {
        join_endpoint(&self.base_url, &self.analyze_path)
    }

    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Request timeout for the non-streaming endpoint as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Idle deadline for open streams, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }
}

// Paths are appended rather than `Url::join`ed so a base URL with a path
// prefix (e.g. behind a reverse proxy) keeps that prefix.
fn join_endpoint(base_url: &str, path: &str) -> Result<Url> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|e| {
        RaidscopeError::Config(format!("Invalid endpoint URL '{}': {}", raw, e)).into()
    })
}

/// Chat session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum number of messages retained in the session history
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Query parameter on the chat view URL that carries a question to auto-send
    #[serde(default = "default_deep_link_param")]
    pub deep_link_param: String,

    /// Template used when a stream fails before producing any text
    #[serde(default = "default_error_template")]
    pub error_template: String,
}

fn default_history_cap() -> usize {
    200
}

fn default_deep_link_param() -> String {
    "q".to_string()
}

fn default_error_template() -> String {
    "Error: {message}".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            deep_link_param: default_deep_link_param(),
            error_template: default_error_template(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RaidscopeError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| RaidscopeError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("RAIDSCOPE_API_BASE") {
            self.api.base_url = base_url;
        }

        if let Ok(stream_path) = std::env::var("RAIDSCOPE_STREAM_PATH") {
            self.api.stream_path = stream_path;
        }

        if let Ok(analyze_path) = std::env::var("RAIDSCOPE_ANALYZE_PATH") {
            self.api.analyze_path = analyze_path;
        }

        if let Ok(idle) = std::env::var("RAIDSCOPE_IDLE_TIMEOUT") {
            match idle.parse::<u64>() {
                Ok(v) => {
                    self.api.idle_timeout_seconds = v;
                    tracing::debug!(idle_timeout_seconds = v, "Env override: RAIDSCOPE_IDLE_TIMEOUT");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for RAIDSCOPE_IDLE_TIMEOUT: {}", idle);
                }
            }
        }

        if let Ok(cap) = std::env::var("RAIDSCOPE_HISTORY_CAP") {
            match cap.parse::<usize>() {
                Ok(v) => {
                    self.chat.history_cap = v;
                    tracing::debug!(history_cap = v, "Env override: RAIDSCOPE_HISTORY_CAP");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for RAIDSCOPE_HISTORY_CAP: {}", cap);
                }
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(api_base) = &cli.api_base {
            tracing::debug!("Using API base override from CLI: {}", api_base);
            self.api.base_url = api_base.clone();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(RaidscopeError::Config("api.base_url cannot be empty".to_string()).into());
        }

        for (name, path) in [
            ("api.stream_path", &self.api.stream_path),
            ("api.analyze_path", &self.api.analyze_path),
        ] {
            if !path.starts_with('/') {
                return Err(RaidscopeError::Config(format!(
                    "{} must start with '/': {}",
                    name, path
                ))
                .into());
            }
        }

        self.api.stream_url()?;
        self.api.analyze_url()?;

        if self.api.connect_timeout_seconds == 0 {
            return Err(RaidscopeError::Config(
                "api.connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.api.request_timeout_seconds == 0 {
            return Err(RaidscopeError::Config(
                "api.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        // A question and its answer placeholder are appended together.
        if self.chat.history_cap < 2 {
            return Err(RaidscopeError::Config(
                "chat.history_cap must be at least 2".to_string(),
            )
            .into());
        }

        if self.chat.deep_link_param.trim().is_empty() {
            return Err(RaidscopeError::Config(
                "chat.deep_link_param cannot be empty".to_string(),
            )
            .into());
        }

        if !self.chat.error_template.contains(ERROR_MESSAGE_PLACEHOLDER) {
            return Err(RaidscopeError::Config(format!(
                "chat.error_template must contain {}",
                ERROR_MESSAGE_PLACEHOLDER
            ))
            .into());
        }

        Ok(())
    }
}
