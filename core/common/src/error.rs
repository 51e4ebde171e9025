//! Common error types for AxiomStore.

use thiserror::Error;

/// Top-level error type for AxiomStore operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed construction arguments.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An encrypted read or write was requested but no key is configured.
    #[error("Encryption requested but no encryption key is configured")]
    EncryptionNotConfigured,

    /// Overwrite-protected create found an existing blob.
    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required call argument is missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was cancelled before the backend call completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Backend transport failure, passed through as reported.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_is_not_found() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());
        assert!(Error::NotFound("x".to_string()).is_not_found());
        assert!(!Error::Cancelled.is_not_found());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::FileAlreadyExists("a.txt".to_string()).to_string(),
            "File already exists: a.txt"
        );
        assert_eq!(Error::Cancelled.to_string(), "Operation cancelled");
    }
}
