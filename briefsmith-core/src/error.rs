//! Error types for the Briefsmith core library.
//!
//! Uses `thiserror` for public API error types. Only configuration and request
//! errors ever escape the synthesis pipeline; provider failures are retried,
//! logged and converted into stage outcomes by the caller.

use std::path::PathBuf;

/// Top-level error type for the Briefsmith core library.
#[derive(Debug, thiserror::Error)]
pub enum BriefError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from generation provider interactions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider {provider} is overloaded")]
    Overloaded { provider: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Model {model} returned no text")]
    EmptyResponse { model: String },
}

impl LlmError {
    /// Whether the error is a transient provider condition worth retrying.
    ///
    /// Rate limits, overload, timeouts and dropped connections are transient;
    /// authentication, parse and empty-response errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::Overloaded { .. }
                | LlmError::Timeout { .. }
                | LlmError::Connection { .. }
        )
    }
}

/// Why one generated section attempt produced nothing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SectionError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Section {section} produced no usable fields")]
    Unusable { section: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No generation provider is configured; set ANTHROPIC_API_KEY or OPENAI_API_KEY")]
    NoProvider,

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from validating a synthesis request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid date for {field}: '{value}' (expected YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("End date {end} is before start date {start}")]
    DateRangeReversed { start: String, end: String },

    #[error("Date range of {days} days exceeds the maximum of {max}")]
    RangeTooLong { days: usize, max: usize },
}

/// A type alias for results using the top-level `BriefError`.
pub type Result<T> = std::result::Result<T, BriefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = BriefError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_no_provider() {
        let err = BriefError::Config(ConfigError::NoProvider);
        assert!(err.to_string().starts_with("Configuration error: No generation provider"));
    }

    #[test]
    fn test_error_display_request() {
        let err = BriefError::Request(RequestError::DateRangeReversed {
            start: "2025-05-07".into(),
            end: "2025-05-04".into(),
        });
        assert_eq!(
            err.to_string(),
            "Request error: End date 2025-05-04 is before start date 2025-05-07"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RateLimited { retry_after_secs: 30 }.is_transient());
        assert!(
            LlmError::Overloaded {
                provider: "anthropic".into()
            }
            .is_transient()
        );
        assert!(LlmError::Timeout { timeout_secs: 120 }.is_transient());
        assert!(
            LlmError::Connection {
                message: "reset".into()
            }
            .is_transient()
        );
        assert!(
            !LlmError::AuthFailed {
                provider: "openai".into()
            }
            .is_transient()
        );
        assert!(
            !LlmError::ResponseParse {
                message: "bad".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BriefError = io_err.into();
        assert!(matches!(err, BriefError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: BriefError = serde_err.into();
        assert!(matches!(err, BriefError::Serialization(_)));
    }
}
