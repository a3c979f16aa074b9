//! Error types for the port synchronization system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for port synchronization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the port synchronization system
#[derive(Error, Debug)]
pub enum Error {
    /// Connection refused, timeout, or other transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials rejected by the upstream or downstream API
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// Response had an unexpected status or shape
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Upstream reports the port-forwarding subsystem as not ready
    #[error("upstream not ready: {0}")]
    UpstreamUnavailable(String),

    /// A port write was accepted but the read-back disagrees
    #[error("verification failed: wrote {expected}, read back {actual}")]
    Verification {
        /// Port the write was supposed to configure
        expected: u16,
        /// Port the read-back actually returned
        actual: u16,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Health snapshot publication errors
    #[error("health publish error: {0}")]
    HealthPublish(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of an [`Error`], used to fold cycle failures into
/// the health snapshot and to pick a logging severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Authentication,
    Protocol,
    UpstreamUnavailable,
    Verification,
    Other,
}

impl ErrorKind {
    /// Stable name used in health snapshots and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Protocol => "protocol",
            ErrorKind::UpstreamUnavailable => "upstream-unavailable",
            ErrorKind::Verification => "verification",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an upstream-unavailable error
    pub fn upstream_unavailable(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Create a verification error
    pub fn verification(expected: u16, actual: u16) -> Self {
        Self::Verification { expected, actual }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a health publication error
    pub fn health_publish(msg: impl Into<String>) -> Self {
        Self::HealthPublish(msg.into())
    }

    /// Classify this error for health folding and log severity
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Error::Verification { .. } => ErrorKind::Verification,
            Error::Config(_)
            | Error::HealthPublish(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification_is_exhaustive_over_taxonomy() {
        assert_eq!(Error::transport("x").kind(), ErrorKind::Transport);
        assert_eq!(Error::auth("x").kind(), ErrorKind::Authentication);
        assert_eq!(Error::protocol("x").kind(), ErrorKind::Protocol);
        assert_eq!(
            Error::upstream_unavailable("x").kind(),
            ErrorKind::UpstreamUnavailable
        );
        assert_eq!(
            Error::verification(51413, 6881).kind(),
            ErrorKind::Verification
        );
        assert_eq!(Error::config("x").kind(), ErrorKind::Other);
    }

    #[test]
    fn verification_message_names_both_ports() {
        let msg = Error::verification(51413, 6881).to_string();
        assert!(msg.contains("51413"));
        assert!(msg.contains("6881"));
    }
}
