//! Transport error taxonomy.

use std::time::Duration;
use thiserror::Error;

/// Phase of a remote call in which a timeout occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    Connect,
    Execute,
}

impl std::fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportPhase::Connect => f.write_str("connect"),
            TransportPhase::Execute => f.write_str("execute"),
        }
    }
}

/// Failures of the session transport.
///
/// A command that ran and exited non-zero is not a transport error; it is
/// reported as an ordinary [`RawResult`](super::RawResult).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Host {host} is not present in the host directory")]
    HostNotFound { host: String },

    #[error("SSH connection lost for {host}: {message}")]
    ConnectionLost { host: String, message: String },

    #[error("SSH access denied for {host}: {message}")]
    PermissionDenied { host: String, message: String },

    #[error("SSH {phase} timed out for {host} after {}ms", after.as_millis())]
    Timeout {
        host: String,
        phase: TransportPhase,
        after: Duration,
    },

    #[error("Gave up on {host} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        host: String,
        attempts: u32,
        last_error: Box<TransportError>,
    },

    #[error("SSH client I/O error for {host}: {message}")]
    Io { host: String, message: String },
}

impl TransportError {
    pub fn connection_lost(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            host: host.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            host: host.into(),
            message: message.into(),
        }
    }

    pub fn timeout(host: impl Into<String>, phase: TransportPhase, after: Duration) -> Self {
        Self::Timeout {
            host: host.into(),
            phase,
            after,
        }
    }

    pub fn io(host: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Io {
            host: host.into(),
            message: error.to_string(),
        }
    }

    /// Host the failure refers to
    pub fn host(&self) -> &str {
        match self {
            TransportError::HostNotFound { host }
            | TransportError::ConnectionLost { host, .. }
            | TransportError::PermissionDenied { host, .. }
            | TransportError::Timeout { host, .. }
            | TransportError::RetriesExhausted { host, .. }
            | TransportError::Io { host, .. } => host,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Authentication failures and unknown hosts are permanent; so is an
    /// exhausted retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionLost { .. } | TransportError::Timeout { .. }
        )
    }
}
