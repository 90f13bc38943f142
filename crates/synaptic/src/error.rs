//! Error types for Synaptic

use thiserror::Error;

/// Main error type for Synaptic operations
#[derive(Error, Debug)]
pub enum SynapticError {
    /// Storage backend errors, surfaced to the caller unchanged
    #[error("Storage error: {0}")]
    Storage(String),

    /// A referenced neuron, synapse or fiber does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SynapticError {
    fn from(err: serde_json::Error) -> Self {
        SynapticError::Serialization(err.to_string())
    }
}

/// Result type alias for Synaptic operations
pub type Result<T> = std::result::Result<T, SynapticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = SynapticError::Storage("connection reset".to_string());
        assert_eq!(err.to_string(), "Storage error: connection reset");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SynapticError = io.into();
        assert!(matches!(err, SynapticError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: SynapticError = parse.unwrap_err().into();
        assert!(matches!(err, SynapticError::Serialization(_)));
    }
}
