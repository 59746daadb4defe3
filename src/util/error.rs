//! Error types for the ahds library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for AmiraMesh / HyperSurface operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// First line is not a recognised AmiraMesh / HyperSurface designation
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Requested stream index never appears before end of file
    #[error("Data stream @{index} not found")]
    StreamNotFound { index: usize },

    /// Markers out of order, group count mismatch, missing field, garbled tag
    #[error("Structural corruption: {0}")]
    StructuralCorruption(String),

    /// Load or decode requested while the policy forbids it
    #[error("Load policy violation: {0}")]
    PolicyViolation(String),

    /// Declared element type outside the type catalog
    #[error("Unsupported element type: {0}")]
    UnsupportedType(String),

    /// Declared compression tag outside {HxByteRLE, HxZip}
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// HxByteRLE output length differs from the declared size
    #[error("HxByteRLE decoded {actual} bytes, expected {expected}")]
    RleLengthMismatch { expected: usize, actual: usize },

    /// Inflate failure or decompressed size mismatch
    #[error("Compression error: {0}")]
    Compression(String),

    /// End of file reached mid-payload
    #[error("Data stream @{index} truncated: {actual} of {expected} bytes available")]
    TruncatedStream {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Invalid reader configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a structural corruption error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::StructuralCorruption(msg.into())
    }

    /// Create a policy violation error.
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::PolicyViolation(msg.into())
    }

    /// True for errors after which a ledger cursor can no longer be trusted.
    pub fn poisons_cursor(&self) -> bool {
        matches!(
            self,
            Self::StructuralCorruption(_) | Self::TruncatedStream { .. } | Self::Io(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias for ahds operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::StreamNotFound { index: 7 };
        assert!(e.to_string().contains("@7"));

        let e = Error::RleLengthMismatch { expected: 8, actual: 5 };
        assert!(e.to_string().contains('8'));
        assert!(e.to_string().contains('5'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.poisons_cursor());
    }

    #[test]
    fn test_poisons_cursor() {
        assert!(Error::corrupt("bad").poisons_cursor());
        assert!(!Error::policy("headeronly").poisons_cursor());
        assert!(!Error::StreamNotFound { index: 1 }.poisons_cursor());
    }
}
