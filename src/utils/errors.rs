// src/utils/errors.rs
//! Crate-wide error types.
//!
//! Configuration and path-resolution errors are raised synchronously at wrap
//! time and never reach a sink. Errors raised by an intercepted call itself
//! are not represented here; they travel through
//! [`CallError`](crate::interception::CallError) unchanged.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Errors produced by the capture pipeline itself.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Invalid or missing configuration (unknown client type, bad settings).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A method path could not be resolved against a client's method table.
    #[error("Method path error: {0}")]
    PathResolution(String),

    /// A sink could not emit or release its resources.
    #[error("Sink failure: {0}")]
    SinkFailed(String),

    /// A record could not be serialized to its line form.
    #[error("Serialization failure: {0}")]
    SerializationFailed(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaptureError::ConfigError("unknown client type 'Foo'".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown client type 'Foo'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CaptureError = io.into();
        assert!(matches!(err, CaptureError::Io(_)));
    }
}
