//! Handshake state machines, free of any I/O.
//!
//! ```text
//!   Initiator                       Responder
//!     |--- Hello{ver, c1} -------->|
//!     |<-- HelloResponse{H(c1),c2} |
//!     |--- Hi{H(c2)} ------------->|
//!     |<-- HiResponse{welcome} ----|
//! ```
//!
//! H(c) = checksum(secret, c), computed by each side with its own secret.

use crate::auth::{self, Secret};
use crate::error::{ProbeError, Result};
use crate::handshake::messages::{Hello, HelloResponse, Hi, HiResponse, PROTOCOL_VERSION};
use crate::handshake::state::{InitiatorState, ResponderState};

fn invalid_transition(from: &str, to: &str) -> ProbeError {
    ProbeError::Protocol(format!("invalid handshake state transition: {from} -> {to}"))
}

/// Client-side (initiator) of the handshake.
pub struct Initiator {
    secret: Secret,
    state: InitiatorState,
}

impl Initiator {
    pub fn new(secret: Secret) -> Self {
        Self {
            secret,
            state: InitiatorState::Idle,
        }
    }

    pub fn state(&self) -> &InitiatorState {
        &self.state
    }

    /// Step 1: produce `Hello` with a fresh challenge.
    pub fn hello(&mut self) -> Result<Hello> {
        self.hello_with_challenge(auth::random_challenge())
    }

    fn hello_with_challenge(&mut self, challenge: String) -> Result<Hello> {
        if self.state != InitiatorState::Idle {
            return Err(invalid_transition(self.state.label(), "HelloSent"));
        }
        self.state = InitiatorState::HelloSent {
            challenge: challenge.clone(),
        };
        Ok(Hello {
            version: PROTOCOL_VERSION.to_string(),
            challenge,
        })
    }

    /// Step 2: check the responder's proof, then answer its challenge.
    pub fn on_hello_response(&mut self, rsp: HelloResponse) -> Result<Hi> {
        let challenge = match &self.state {
            InitiatorState::HelloSent { challenge } => challenge,
            other => return Err(invalid_transition(other.label(), "HiSent")),
        };

        if !auth::verify(&self.secret, challenge, &rsp.checksum) {
            self.state = InitiatorState::Failed;
            return Err(ProbeError::AuthenticationFailed(
                "server failed to prove it holds the secret",
            ));
        }

        self.state = InitiatorState::HiSent;
        Ok(Hi {
            checksum: auth::checksum(&self.secret, &rsp.challenge),
        })
    }

    /// Step 3: accept the responder's verdict.
    pub fn on_hi_response(&mut self, rsp: HiResponse) -> Result<()> {
        if self.state != InitiatorState::HiSent {
            return Err(invalid_transition(self.state.label(), "Authenticated"));
        }
        if !rsp.welcome {
            self.state = InitiatorState::Failed;
            return Err(ProbeError::AuthenticationRejected);
        }
        self.state = InitiatorState::Authenticated;
        Ok(())
    }
}

/// Server-side (responder) of the handshake.
pub struct Responder {
    secret: Secret,
    state: ResponderState,
}

impl Responder {
    pub fn new(secret: Secret) -> Self {
        Self {
            secret,
            state: ResponderState::Idle,
        }
    }

    pub fn state(&self) -> &ResponderState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == ResponderState::Authenticated
    }

    /// Step 1: prove the secret against the initiator's challenge and issue ours.
    pub fn on_hello(&mut self, hello: Hello) -> Result<HelloResponse> {
        self.on_hello_with_challenge(hello, auth::random_challenge())
    }

    fn on_hello_with_challenge(&mut self, hello: Hello, challenge: String) -> Result<HelloResponse> {
        if self.state != ResponderState::Idle {
            return Err(invalid_transition(self.state.label(), "ChallengeSent"));
        }
        if hello.version != PROTOCOL_VERSION {
            self.state = ResponderState::Failed;
            return Err(ProbeError::UnsupportedVersion(hello.version));
        }

        let checksum = auth::checksum(&self.secret, &hello.challenge);
        self.state = ResponderState::ChallengeSent {
            challenge: challenge.clone(),
        };
        Ok(HelloResponse {
            checksum,
            challenge,
        })
    }

    /// Step 2: check the initiator's proof. The verdict is always returned so
    /// it can be sent, even when the proof is wrong; check
    /// [`Responder::is_authenticated`] afterwards.
    pub fn on_hi(&mut self, hi: Hi) -> Result<HiResponse> {
        let welcome = match &self.state {
            ResponderState::ChallengeSent { challenge } => {
                auth::verify(&self.secret, challenge, &hi.checksum)
            }
            other => return Err(invalid_transition(other.label(), "Authenticated")),
        };

        self.state = if welcome {
            ResponderState::Authenticated
        } else {
            ResponderState::Failed
        };
        Ok(HiResponse { welcome })
    }
}
