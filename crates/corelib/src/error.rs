//! Error types for the core library.

use std::fmt;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid node identifier
    InvalidNode(String),
    /// Ring operation failed
    RingOperation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidNode(msg) => write!(f, "Invalid node: {}", msg),
            Error::RingOperation(msg) => write!(f, "Ring operation failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
