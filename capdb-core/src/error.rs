//! Error types for CapDB

use thiserror::Error;

/// Result type alias for CapDB operations
pub type Result<T> = std::result::Result<T, CapError>;

/// CapDB error types
#[derive(Error, Debug)]
pub enum CapError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation attempted on a closed or closing store
    #[error("store is closed")]
    Closed,

    /// The writer lapped a block while it was being read
    #[error("block {id} rolled over mid-read")]
    RolledOver { id: u64 },

    /// Compression/decompression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid on-disk format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl CapError {
    /// Check if error indicates a mid-read rollover
    pub fn is_rolled_over(&self) -> bool {
        matches!(self, CapError::RolledOver { .. })
    }

    /// Check if error indicates a closed store
    pub fn is_closed(&self) -> bool {
        matches!(self, CapError::Closed)
    }

    /// Extract a `CapError` carried inside an I/O error raised by a block
    /// stream, if any
    pub fn from_io(err: &std::io::Error) -> Option<&CapError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<CapError>())
    }

    pub(crate) fn into_io(self) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_roundtrip() {
        let err = CapError::RolledOver { id: 42 }.into_io();
        let inner = CapError::from_io(&err).unwrap();
        assert!(inner.is_rolled_over());
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_closed_classification() {
        let err = CapError::Closed.into_io();
        assert!(CapError::from_io(&err).unwrap().is_closed());

        let plain = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(CapError::from_io(&plain).is_none());
    }
}
