//! Error types for Raidscope
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.
//!
//! Streaming failures never escape the chat session as `Err` values: the
//! transport renders them with `Display` and delivers them as the terminal
//! event of the stream. The variants below therefore double as the
//! human-readable diagnostics shown inline in the conversation.

use thiserror::Error;

/// Main error type for Raidscope operations
#[derive(Error, Debug)]
pub enum RaidscopeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection-level failures (refused, reset, dropped mid-stream)
    #[error("Connection error: {0}")]
    Transport(String),

    /// The analysis service answered with a non-success status
    #[error("Analysis service returned HTTP {status}: {body}")]
    Http {
        /// Numeric HTTP status code
        status: u16,
        /// Truncated response body, may be empty
        body: String,
    },

    /// The event stream could not be decoded
    #[error("Malformed stream: {0}")]
    Framing(String),

    /// No data arrived before the idle deadline elapsed
    #[error("No data received from the analysis service for {0} seconds")]
    IdleTimeout(u64),

    /// The non-streaming analyze endpoint returned an unusable payload
    #[error("Analysis API error: {0}")]
    Api(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for Raidscope operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = RaidscopeError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_transport_error_display() {
        let error = RaidscopeError::Transport("connection refused".to_string());
        assert_eq!(error.to_string(), "Connection error: connection refused");
    }

    #[test]
    fn test_http_error_display() {
        let error = RaidscopeError::Http {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Analysis service returned HTTP 502: bad gateway"
        );
    }

    #[test]
    fn test_framing_error_display() {
        let error = RaidscopeError::Framing("invalid UTF-8 in event".to_string());
        assert_eq!(error.to_string(), "Malformed stream: invalid UTF-8 in event");
    }

    #[test]
    fn test_idle_timeout_display() {
        let error = RaidscopeError::IdleTimeout(30);
        assert!(error.to_string().contains("30 seconds"));
    }

    #[test]
    fn test_api_error_display() {
        let error = RaidscopeError::Api("missing answer".to_string());
        assert_eq!(error.to_string(), "Analysis API error: missing answer");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: RaidscopeError = io_error.into();
        assert!(matches!(error, RaidscopeError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: RaidscopeError = json_error.into();
        assert!(matches!(error, RaidscopeError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: RaidscopeError = yaml_error.into();
        assert!(matches!(error, RaidscopeError::Yaml(_)));
    }

    #[test]
    fn test_url_error_conversion() {
        let url_error = url::Url::parse("not a url").unwrap_err();
        let error: RaidscopeError = url_error.into();
        assert!(matches!(error, RaidscopeError::Url(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RaidscopeError>();
    }
}
