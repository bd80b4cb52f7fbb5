//! Ed25519 token signer and key material handling.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::pkcs8::EncodePublicKey;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::token::{signed_message, SignedToken};
use super::SigningError;
use crate::config::SigningConfig;
use crate::constants::system;

const PRIVATE_KEY_FILE: &str = "priv.key";
const PUBLIC_KEY_FILE: &str = "pub.key";

/// Signs operations into time-bound tokens.
///
/// One signer is built at startup and shared for the life of the process; the
/// private key never leaves it.
pub struct TokenSigner {
    signing_key: SigningKey,
    ttl_seconds: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("public_key", &hex::encode(self.verifying_key().as_bytes()))
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenSigner {
    /// Signer with a freshly generated key
    pub fn generate(ttl_seconds: i64) -> Result<Self, SigningError> {
        Self::from_signing_key(generate_signing_key(), ttl_seconds)
    }

    pub fn from_signing_key(signing_key: SigningKey, ttl_seconds: i64) -> Result<Self, SigningError> {
        if ttl_seconds <= 0 {
            return Err(SigningError::InvalidTtl(ttl_seconds));
        }
        Ok(Self {
            signing_key,
            ttl_seconds,
        })
    }

    /// Build the signer described by configuration.
    ///
    /// With a key directory the key pair is loaded from it, or generated and
    /// written there when absent, so that restarts keep the same public key.
    pub fn from_config(config: &SigningConfig) -> Result<Self, SigningError> {
        let signing_key = match &config.key_directory {
            Some(directory) => load_or_generate_key(directory)?,
            None => generate_signing_key(),
        };
        let signer = Self::from_signing_key(signing_key, config.token_ttl_seconds)?;
        info!(
            ttl_seconds = signer.ttl_seconds,
            persisted = config.key_directory.is_some(),
            "🔑 Token signer initialized"
        );
        Ok(signer)
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign `operation` as of now and return the wire token
    pub fn sign(&self, operation: &str) -> Result<String, SigningError> {
        self.sign_at(operation, chrono::Utc::now().timestamp())?.encode()
    }

    /// Build a signed token with an explicit issue time
    pub fn sign_at(&self, operation: &str, timestamp: i64) -> Result<SignedToken, SigningError> {
        let expiry = timestamp
            .checked_add(self.ttl_seconds)
            .ok_or(SigningError::InvalidTtl(self.ttl_seconds))?;
        let nonce = generate_nonce();

        let message = signed_message(timestamp, &nonce, expiry, operation);
        let signature = self.signing_key.sign(message.as_bytes());

        Ok(SignedToken {
            timestamp,
            nonce,
            expiry,
            operation: operation.to_string(),
            signature: STANDARD.encode(signature.to_bytes()),
        })
    }

    /// Public key as SubjectPublicKeyInfo DER
    pub fn public_key_der(&self) -> Result<Vec<u8>, SigningError> {
        self.verifying_key()
            .to_public_key_der()
            .map(|document| document.as_bytes().to_vec())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))
    }

    /// Base64 of [`TokenSigner::public_key_der`], for distribution to verifiers
    pub fn public_key_base64(&self) -> Result<String, SigningError> {
        Ok(STANDARD.encode(self.public_key_der()?))
    }
}

fn generate_signing_key() -> SigningKey {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    SigningKey::from_bytes(&seed)
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; system::NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn load_or_generate_key(directory: &Path) -> Result<SigningKey, SigningError> {
    let private_path = directory.join(PRIVATE_KEY_FILE);
    let public_path = directory.join(PUBLIC_KEY_FILE);

    if private_path.exists() && public_path.exists() {
        let bytes = fs::read(&private_path).map_err(|e| SigningError::key_io(&private_path, e))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SigningError::InvalidKey(format!(
                "{} must hold a raw 32-byte Ed25519 private key",
                private_path.display()
            ))
        })?;
        debug!(path = %private_path.display(), "Loaded persisted signing key");
        return Ok(SigningKey::from_bytes(&seed));
    }

    fs::create_dir_all(directory).map_err(|e| SigningError::key_io(directory, e))?;
    let signing_key = generate_signing_key();
    write_private_key(&private_path, &signing_key)?;

    let public_der = signing_key
        .verifying_key()
        .to_public_key_der()
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
    fs::write(&public_path, STANDARD.encode(public_der.as_bytes()))
        .map_err(|e| SigningError::key_io(&public_path, e))?;

    info!(directory = %directory.display(), "🔑 Generated and stored new signing key pair");
    Ok(signing_key)
}

fn write_private_key(path: &Path, signing_key: &SigningKey) -> Result<(), SigningError> {
    fs::write(path, signing_key.to_bytes()).map_err(|e| SigningError::key_io(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| SigningError::key_io(path, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::DecodePublicKey;
    use tempfile::TempDir;

    #[test]
    fn test_sign_produces_verifiable_token() {
        let signer = TokenSigner::generate(900).unwrap();
        let token = signer.sign_at("NS.GET_ZONE_MASTER example.com", 1_700_000_000).unwrap();

        assert_eq!(token.expiry - token.timestamp, 900);
        assert_eq!(token.nonce.len(), system::NONCE_BYTES * 2);
        assert!(token.verify(&signer.verifying_key(), 1_700_000_000).is_ok());
    }

    #[test]
    fn test_nonces_are_fresh_per_token() {
        let signer = TokenSigner::generate(60).unwrap();
        let first = signer.sign_at("EXECUTOR.STATUS", 10).unwrap();
        let second = signer.sign_at("EXECUTOR.STATUS", 10).unwrap();
        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn test_non_positive_ttl_is_rejected() {
        assert!(matches!(
            TokenSigner::generate(0),
            Err(SigningError::InvalidTtl(0))
        ));
    }

    #[test]
    fn test_public_key_is_spki_der() {
        let signer = TokenSigner::generate(900).unwrap();
        let der = signer.public_key_der().unwrap();

        // SEQUENCE { SEQUENCE { OID 1.3.101.112 }, BIT STRING (32 bytes) }
        assert_eq!(der.len(), 44);
        assert_eq!(&der[..12], &[0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00]);

        let decoded = VerifyingKey::from_public_key_der(&der).unwrap();
        assert_eq!(decoded, signer.verifying_key());

        let b64 = signer.public_key_base64().unwrap();
        assert_eq!(STANDARD.decode(b64).unwrap(), der);
    }

    #[test]
    fn test_key_directory_persists_key_pair() {
        let dir = TempDir::new().unwrap();
        let config = SigningConfig {
            token_ttl_seconds: 900,
            key_directory: Some(dir.path().join("keys")),
        };

        let first = TokenSigner::from_config(&config).unwrap();
        let second = TokenSigner::from_config(&config).unwrap();
        assert_eq!(first.verifying_key(), second.verifying_key());

        let stored_public = fs::read_to_string(dir.path().join("keys").join(PUBLIC_KEY_FILE)).unwrap();
        assert_eq!(stored_public, first.public_key_base64().unwrap());
    }

    #[test]
    fn test_corrupt_private_key_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PRIVATE_KEY_FILE), b"short").unwrap();
        fs::write(dir.path().join(PUBLIC_KEY_FILE), b"irrelevant").unwrap();

        let config = SigningConfig {
            token_ttl_seconds: 900,
            key_directory: Some(dir.path().to_path_buf()),
        };
        assert!(matches!(
            TokenSigner::from_config(&config),
            Err(SigningError::InvalidKey(_))
        ));
    }
}
