//! Error type system for the converter
//!
//! Heuristic misses never reach this type; they are [`ParseMiss`] values
//! consumed inside the analyzers. `ConverterError` covers the genuinely
//! unexpected: configuration, I/O and network failures.
//!
//! [`ParseMiss`]: crate::plugin::extract::ParseMiss

use crate::core::config::ConfigError;

/// Main error type for the converter
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Plugin source is empty: {0}")]
    EmptySource(String),
}

impl ConverterError {
    /// Get the error type name for log output
    pub fn error_type(&self) -> &'static str {
        match self {
            ConverterError::Config(_) => "ConfigError",
            ConverterError::Io(_) => "IoError",
            ConverterError::Network(_) => "NetworkError",
            ConverterError::HttpStatus { .. } => "HttpStatusError",
            ConverterError::InvalidUrl(_) => "InvalidUrl",
            ConverterError::Serialization(_) => "SerializationError",
            ConverterError::EmptySource(_) => "EmptySource",
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ConverterError::Network(e) => e.is_timeout() || e.is_connect(),
            ConverterError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for operations that can fail with ConverterError
pub type Result<T> = std::result::Result<T, ConverterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let status = ConverterError::HttpStatus {
            status: 404,
            url: "https://foo.example/x".into(),
        };
        assert_eq!(status.error_type(), "HttpStatusError");
        assert!(status.to_string().contains("404"));

        let bad_url: ConverterError = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(bad_url.error_type(), "InvalidUrl");

        let io: ConverterError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(io.error_type(), "IoError");
    }

    #[test]
    fn test_error_retryable() {
        let server = ConverterError::HttpStatus {
            status: 503,
            url: String::new(),
        };
        let throttled = ConverterError::HttpStatus {
            status: 429,
            url: String::new(),
        };
        let missing = ConverterError::HttpStatus {
            status: 404,
            url: String::new(),
        };
        assert!(server.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!ConverterError::EmptySource("a.js".into()).is_retryable());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ConverterError = ConfigError::InvalidHttp("timeout".into()).into();
        assert_eq!(err.error_type(), "ConfigError");
        assert!(err.to_string().contains("timeout"));
    }
}
