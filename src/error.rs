use thiserror::Error;

use crate::config::ConfigurationError;
use crate::protocol::ProtocolError;
use crate::signing::SigningError;
use crate::transport::TransportError;

/// Crate-level error for setup paths: configuration, key material and the
/// lower layers when used directly. The client façade never returns it.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_keep_source_message() {
        let error: ExecutorError = TransportError::connection_lost("h1", "reset by peer").into();
        assert!(error.to_string().starts_with("Transport error:"));
        assert!(error.to_string().contains("reset by peer"));

        let error: ExecutorError = SigningError::InvalidTtl(0).into();
        assert!(matches!(error, ExecutorError::Signing(SigningError::InvalidTtl(0))));
    }
}
