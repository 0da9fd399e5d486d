//! Error types for Figma operations

use thiserror::Error;

/// Result type for Figma operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during Figma operations
#[derive(Error, Debug)]
pub enum Error {
    /// Figma answered with a non-success status
    #[error("Figma API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failure talking to Figma or the image CDN
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication error
    #[error("Figma authentication error: {0}")]
    Auth(String),

    /// The export call succeeded but carried no URL for the node
    #[error("No image URL returned from Figma for node {0}")]
    NoImage(String),

    /// Image download from the export URL failed
    #[error("Failed to download image ({0})")]
    Download(u16),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// HTTP status behind this error, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::Download(status) => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
