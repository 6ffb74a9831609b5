//! Error types for LLM operations

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit or usage quota exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, body: String, model: &str) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed,
            429 => Self::RateLimitExceeded(body),
            400 => Self::InvalidRequest(body),
            404 => Self::ModelNotFound(model.to_string()),
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }

    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::UnexpectedResponse(_) => true,
            Self::RequestFailed(msg) => msg.starts_with("HTTP 5"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            LLMError::from_status(429, "RESOURCE_EXHAUSTED".into(), "m"),
            LLMError::RateLimitExceeded(body) if body == "RESOURCE_EXHAUSTED"
        ));
        assert!(matches!(
            LLMError::from_status(404, String::new(), "gemini-x"),
            LLMError::ModelNotFound(m) if m == "gemini-x"
        ));
        assert!(matches!(
            LLMError::from_status(403, String::new(), "m"),
            LLMError::AuthenticationFailed
        ));
    }

    #[test]
    fn test_is_transient() {
        assert!(LLMError::from_status(503, "busy".into(), "m").is_transient());
        assert!(!LLMError::from_status(400, "bad".into(), "m").is_transient());
        assert!(!LLMError::RateLimitExceeded("quota".into()).is_transient());
        assert!(!LLMError::AuthenticationFailed.is_transient());
    }
}
