//! Error types for remove.bg client operations

use thiserror::Error;

/// Result type alias for remove.bg client operations
pub type Result<T> = std::result::Result<T, RemoveBgError>;

/// Error kinds surfaced by the client
#[derive(Error, Debug)]
pub enum RemoveBgError {
    /// Missing API key, invalid header, unreadable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A terminal operation was invoked before `file`, `url` or `base64`
    #[error("No image source configured: call file(), url() or base64() before sending")]
    MissingSource,

    /// The service answered with an error status
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Raw response body, kept for debugging
        body: String,
    },

    /// Success status, but the body does not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// DNS, connect, TLS and timeout failures from the HTTP client
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Reading the source image or writing the result
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoveBgError {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new malformed response error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create an API error from a status, message and raw body
    pub fn api<S: Into<String>>(status: u16, message: S, body: String) -> Self {
        Self::Api {
            status,
            message: message.into(),
            body,
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// HTTP status carried by an API error
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error came from the service rather than the local side
    #[must_use]
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}
