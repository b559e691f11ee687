//! Handshake messages, exchanged in the fixed order
//! Hello -> HelloResponse -> Hi -> HiResponse.

use serde::{Deserialize, Serialize};

/// Protocol version carried in every `Hello`.
pub const PROTOCOL_VERSION: &str = "v1";

/// Message 1: Initiator -> Responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hello {
    pub version: String,
    /// Challenge the responder must prove the secret against.
    pub challenge: String,
}

/// Message 2: Responder -> Initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HelloResponse {
    /// `checksum(secret, Hello.challenge)`.
    pub checksum: Vec<u8>,
    /// Challenge the initiator must prove the secret against.
    pub challenge: String,
}

/// Message 3: Initiator -> Responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hi {
    /// `checksum(secret, HelloResponse.challenge)`.
    pub checksum: Vec<u8>,
}

/// Message 4: Responder -> Initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HiResponse {
    pub welcome: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let hello = Hello {
            version: PROTOCOL_VERSION.to_string(),
            challenge: "0123456789abcdef".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&hello).unwrap(),
            r#"{"version":"v1","challenge":"0123456789abcdef"}"#
        );
        assert_eq!(
            serde_json::to_string(&HiResponse { welcome: true }).unwrap(),
            r#"{"welcome":true}"#
        );
    }

    #[test]
    fn test_messages_are_not_interchangeable() {
        // A HelloResponse arriving where a Hi is expected must not decode.
        let rsp = HelloResponse {
            checksum: vec![1, 2, 3],
            challenge: "abc".to_string(),
        };
        let raw = serde_json::to_vec(&rsp).unwrap();
        assert!(serde_json::from_slice::<Hi>(&raw).is_err());
        assert!(serde_json::from_slice::<HiResponse>(br#"{"checksum":[]}"#).is_err());
    }
}
