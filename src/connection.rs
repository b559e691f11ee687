//! Connection lifecycle states, shared by the client and server units.
//!
//! ```text
//! Dialing -> Authenticating -> Authenticated -> Probing | Serving -> Closed
//!        \____________________________________/
//!              (no credential configured)
//! ```

use std::fmt;

/// Current state of a connection owned by one lifecycle unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Establishing the transport connection (client only).
    Dialing,
    /// Running the handshake.
    Authenticating,
    /// Handshake completed; not yet handed to the application layer.
    Authenticated,
    /// Client is issuing periodic echo requests.
    Probing,
    /// Server is answering requests through the RPC layer.
    Serving,
    /// Transport closed; the unit either retries or terminates.
    Closed,
}

impl ConnState {
    /// State entered once the transport is up, depending on whether a
    /// credential is configured.
    pub fn after_connect(authenticate: bool, serving: bool) -> Self {
        match (authenticate, serving) {
            (true, _) => ConnState::Authenticating,
            (false, true) => ConnState::Serving,
            (false, false) => ConnState::Probing,
        }
    }

    /// Label used as the `phase` field in log lines.
    pub fn label(self) -> &'static str {
        match self {
            ConnState::Dialing => "dialing",
            ConnState::Authenticating => "authenticating",
            ConnState::Authenticated => "authenticated",
            ConnState::Probing => "probing",
            ConnState::Serving => "serving",
            ConnState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_skipped_without_credential() {
        assert_eq!(ConnState::after_connect(false, true), ConnState::Serving);
        assert_eq!(ConnState::after_connect(false, false), ConnState::Probing);
        assert_eq!(
            ConnState::after_connect(true, true),
            ConnState::Authenticating
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnState::Authenticating.to_string(), "authenticating");
    }
}
