//! Signed token wire format.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::SigningError;
use crate::constants::system;

/// Time-bound, signed encoding of one operation.
///
/// Field declaration order is the JSON field order on the wire. The signed
/// message is `timestamp|nonce|expiry|operation`, so a verifier can rebuild it
/// from the decoded fields alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedToken {
    pub timestamp: i64,
    pub nonce: String,
    pub expiry: i64,
    pub operation: String,
    /// Base64 Ed25519 signature over [`SignedToken::signed_message`]
    pub signature: String,
}

impl SignedToken {
    /// Message covered by the signature
    pub fn signed_message(&self) -> String {
        signed_message(self.timestamp, &self.nonce, self.expiry, &self.operation)
    }

    /// base64(JSON) wire encoding
    pub fn encode(&self) -> Result<String, SigningError> {
        let json = serde_json::to_vec(self).map_err(|e| SigningError::Serialization(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self, SigningError> {
        let json = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SigningError::InvalidEncoding(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| SigningError::InvalidEncoding(e.to_string()))
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry < now
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.expiry - self.timestamp
    }

    /// Check the token the way the remote verifier does: reject expired
    /// tokens, then recompute the signed message and check the signature.
    pub fn verify(&self, key: &VerifyingKey, now: i64) -> Result<(), SigningError> {
        if self.is_expired(now) {
            return Err(SigningError::Expired {
                expiry: self.expiry,
                now,
            });
        }

        let signature_bytes = STANDARD
            .decode(&self.signature)
            .map_err(|e| SigningError::InvalidEncoding(e.to_string()))?;
        let signature =
            Signature::from_slice(&signature_bytes).map_err(|_| SigningError::InvalidSignature)?;

        key.verify(self.signed_message().as_bytes(), &signature)
            .map_err(|_| SigningError::InvalidSignature)
    }
}

pub(crate) fn signed_message(timestamp: i64, nonce: &str, expiry: i64, operation: &str) -> String {
    [
        timestamp.to_string(),
        nonce.to_string(),
        expiry.to_string(),
        operation.to_string(),
    ]
    .join(system::SIGNED_FIELD_SEPARATOR)
}
