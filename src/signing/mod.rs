//! # Token Signing
//!
//! Every remote operation travels as a signed, time-bound token. The
//! [`TokenSigner`] owns the Ed25519 key pair for the life of the process and
//! the remote verifier holds only the public key.
//!
//! ```rust
//! use signed_executor::signing::{SignedToken, TokenSigner};
//!
//! let signer = TokenSigner::generate(900).unwrap();
//! let wire = signer.sign("NS.GET_ZONE_MASTER example.com").unwrap();
//!
//! let token = SignedToken::decode(&wire).unwrap();
//! assert_eq!(token.operation, "NS.GET_ZONE_MASTER example.com");
//! assert!(token.verify(&signer.verifying_key(), token.timestamp).is_ok());
//! ```

pub mod signer;
pub mod token;

pub use signer::TokenSigner;
pub use token::SignedToken;

use std::path::Path;
use thiserror::Error;

/// Errors raised while producing or checking tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("Token TTL must be positive, got {0} seconds")]
    InvalidTtl(i64),

    #[error("Invalid token encoding: {0}")]
    InvalidEncoding(String),

    #[error("Token serialization failed: {0}")]
    Serialization(String),

    #[error("Token signature does not match its contents")]
    InvalidSignature,

    #[error("Token expired at {expiry} (now {now})")]
    Expired { expiry: i64, now: i64 },

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Key file error at {path}: {message}")]
    KeyIo { path: String, message: String },
}

impl SigningError {
    pub fn key_io(path: &Path, error: std::io::Error) -> Self {
        Self::KeyIo {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}
