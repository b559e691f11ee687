//! Per-connection handshake state. Nothing here is shared across connections.

/// Initiator progress through the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiatorState {
    /// Nothing sent yet.
    Idle,
    /// `Hello` sent, waiting for `HelloResponse`.
    HelloSent { challenge: String },
    /// `Hi` sent, waiting for `HiResponse`.
    HiSent,
    /// Both sides proved possession of the secret.
    Authenticated,
    /// A check failed; the connection must be closed.
    Failed,
}

impl InitiatorState {
    /// Human-readable label for the current state (used in error messages).
    pub fn label(&self) -> &'static str {
        match self {
            InitiatorState::Idle => "Idle",
            InitiatorState::HelloSent { .. } => "HelloSent",
            InitiatorState::HiSent => "HiSent",
            InitiatorState::Authenticated => "Authenticated",
            InitiatorState::Failed => "Failed",
        }
    }
}

/// Responder progress through the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderState {
    /// Waiting for `Hello`.
    Idle,
    /// `HelloResponse` sent, waiting for `Hi`.
    ChallengeSent { challenge: String },
    Authenticated,
    Failed,
}

impl ResponderState {
    pub fn label(&self) -> &'static str {
        match self {
            ResponderState::Idle => "Idle",
            ResponderState::ChallengeSent { .. } => "ChallengeSent",
            ResponderState::Authenticated => "Authenticated",
            ResponderState::Failed => "Failed",
        }
    }
}
