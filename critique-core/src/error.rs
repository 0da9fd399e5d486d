//! Error types for the critique pipeline

use thiserror::Error;

/// Result type alias for critique operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for critique operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure (connection, timeout, body decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A batch precondition was violated before any screen was processed
    #[error("{0}")]
    Precondition(String),

    /// The requested AI provider is not registered
    #[error("Unsupported AI provider: {0}. Please select a valid provider.")]
    UnsupportedProvider(String),

    /// The AI provider answered with a non-success status
    #[error("{provider} API error ({status}): {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    /// The credential is malformed for the selected provider
    #[error("Provider credential error: {0}")]
    ProviderAuth(String),

    /// The provider replied but no findings array could be extracted
    #[error("Could not parse findings from response: {0}")]
    UnparsableResponse(String),

    /// The screen image could not be exported or downloaded
    #[error("Image export failed: {0}")]
    ImageExport(String),

    /// The host commenting API rejected a write
    #[error("Comment post failed ({status}): {message}")]
    CommentPost { status: u16, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a provider error from a status code and response body
    pub fn provider(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Whether this error aborts the whole batch rather than one screen
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message() {
        let err = Error::provider("Groq", 429, "rate limited");
        assert_eq!(err.to_string(), "Groq API error (429): rate limited");
    }

    #[test]
    fn test_unsupported_provider_message() {
        let err = Error::UnsupportedProvider("bard".to_string());
        assert!(err.to_string().contains("Unsupported AI provider: bard"));
    }

    #[test]
    fn test_is_precondition() {
        assert!(Error::Precondition("File key is required".to_string()).is_precondition());
        assert!(!Error::ImageExport("boom".to_string()).is_precondition());
    }
}
