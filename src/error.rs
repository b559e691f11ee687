//! Error types shared by the handshake, RPC and lifecycle layers.

use std::time::Duration;
use thiserror::Error;

/// Failures of a single connection or lifecycle unit.
///
/// None of these are fatal to the process; the owning unit closes its
/// connection and either terminates (server) or retries (client).
#[derive(Debug, Error)]
pub enum ProbeError {
    // Transport
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection closed by peer")]
    ConnectionClosed,

    // Handshake
    #[error("handshake timed out waiting for {phase}")]
    HandshakeTimeout { phase: &'static str },

    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("protocol version not supported: {0}")]
    UnsupportedVersion(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    #[error("authentication rejected: responder rejected our proof")]
    AuthenticationRejected,

    // Application
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl ProbeError {
    /// Whether this error, raised during a handshake, counts as a failed
    /// authentication. Timeouts and malformed messages grant no trust.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ProbeError::AuthenticationFailed(_)
                | ProbeError::AuthenticationRejected
                | ProbeError::HandshakeTimeout { .. }
                | ProbeError::Decode(_)
                | ProbeError::Protocol(_)
                | ProbeError::UnsupportedVersion(_)
        )
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_classification() {
        assert!(ProbeError::HandshakeTimeout { phase: "Hi" }.is_auth_failure());
        assert!(ProbeError::AuthenticationRejected.is_auth_failure());
        assert!(ProbeError::Protocol("out of order".into()).is_auth_failure());
        assert!(!ProbeError::ConnectionClosed.is_auth_failure());
        assert!(!ProbeError::ConnectTimeout(Duration::from_secs(5)).is_auth_failure());
    }

    #[test]
    fn test_display_includes_phase() {
        let err = ProbeError::HandshakeTimeout {
            phase: "HelloResponse",
        };
        assert_eq!(
            err.to_string(),
            "handshake timed out waiting for HelloResponse"
        );
    }
}
