//! Shared-secret credentials and the checksum binding a secret to a challenge.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Length of every challenge issued during a handshake.
pub const CHALLENGE_LEN: usize = 16;

/// A process-wide credential, read-only once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Arc<str>);

impl Secret {
    /// Wrap a token. An empty token means "no credential" and yields `None`.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref();
        if token.is_empty() {
            None
        } else {
            Some(Secret(Arc::from(token)))
        }
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// `SHA-256(secret ‖ challenge)`. Secret first, then challenge.
pub fn checksum(secret: &Secret, challenge: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(challenge.as_bytes());
    hasher.finalize().to_vec()
}

/// Check a peer's tag against the one we compute from our own secret.
pub fn verify(secret: &Secret, challenge: &str, tag: &[u8]) -> bool {
    checksum(secret, challenge).as_slice() == tag
}

/// A fresh printable challenge of `CHALLENGE_LEN` alphanumeric characters.
pub fn random_challenge() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CHALLENGE_LEN)
        .map(char::from)
        .collect()
}
