//! Crate-wide error type
//!
//! Engine operations return [`MatrixError`] directly so callers can match on
//! the failure kind. This wrapper covers the daemon surfaces that also touch
//! sockets and config files.

use crate::matrix::MatrixError;

/// Errors surfaced by the daemon and its control server
#[derive(Debug)]
pub enum Error {
    /// Socket or file I/O failed
    Io(std::io::Error),
    /// A routing-matrix operation was rejected
    Matrix(MatrixError),
    /// Configuration could not be loaded or is invalid
    Config(String),
}

/// Result alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Matrix(e) => write!(f, "Matrix error: {}", e),
            Error::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Matrix(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<MatrixError> for Error {
    fn from(e: MatrixError) -> Self {
        Error::Matrix(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
