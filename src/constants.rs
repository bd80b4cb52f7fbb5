//! # System Constants
//!
//! Core constants and the closed status taxonomy shared by the signing,
//! transport and protocol layers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed operational values of the executor core
pub mod system {
    /// Lifetime of a signed token in seconds
    pub const TOKEN_TTL_SECONDS: i64 = 900;

    /// Number of random bytes in a token nonce (hex encoded to twice the length)
    pub const NONCE_BYTES: usize = 8;

    /// Remote entry point that verifies and dispatches a signed token
    pub const REMOTE_EXECUTE_VERB: &str = "execute";

    /// Separator between the signed token fields
    pub const SIGNED_FIELD_SEPARATOR: &str = "|";

    /// Stderr prefixes emitted by the SSH client during session setup
    pub const BENIGN_STDERR_PREFIXES: &[&str] = &["warning: permanently added"];

    /// Upper bound on simultaneous session creations during warmup
    pub const DEFAULT_WARMUP_CONCURRENCY: usize = 100;

    /// Default concurrency cap for batch fan-out
    pub const DEFAULT_BATCH_CONCURRENCY: usize = 50;

    /// Default per-call command execution timeout in milliseconds
    pub const DEFAULT_EXECUTION_TIMEOUT_MS: u64 = 1_000;

    /// Default interval between fleet warmup rounds in seconds
    pub const DEFAULT_WARMUP_INTERVAL_SECONDS: u64 = 300;
}

/// Outcome reported by a remote operation inside its response envelope.
///
/// The set is closed: anything the remote sends that is not one of these
/// variants is read as [`ExecutionStatus::InternalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Ok,
    Created,
    BadRequest,
    Unauthorized,
    UnprocessableEntity,
    NotFound,
    InternalError,
}

impl ExecutionStatus {
    pub const ALL: [ExecutionStatus; 7] = [
        ExecutionStatus::Ok,
        ExecutionStatus::Created,
        ExecutionStatus::BadRequest,
        ExecutionStatus::Unauthorized,
        ExecutionStatus::UnprocessableEntity,
        ExecutionStatus::NotFound,
        ExecutionStatus::InternalError,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Ok => "OK",
            ExecutionStatus::Created => "CREATED",
            ExecutionStatus::BadRequest => "BAD_REQUEST",
            ExecutionStatus::Unauthorized => "UNAUTHORIZED",
            ExecutionStatus::UnprocessableEntity => "UNPROCESSABLE_ENTITY",
            ExecutionStatus::NotFound => "NOT_FOUND",
            ExecutionStatus::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP-like status code
    pub fn code(&self) -> u16 {
        match self {
            ExecutionStatus::Ok => 200,
            ExecutionStatus::Created => 201,
            ExecutionStatus::BadRequest => 400,
            ExecutionStatus::Unauthorized => 401,
            ExecutionStatus::UnprocessableEntity => 422,
            ExecutionStatus::NotFound => 404,
            ExecutionStatus::InternalError => 500,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    /// Normalize a status string received from a remote host.
    ///
    /// Surrounding whitespace and letter case are ignored, and inner runs of
    /// whitespace or hyphens are read as underscores. Unrecognized values map
    /// to `InternalError`.
    pub fn from_wire(raw: &str) -> Self {
        let normalized = raw
            .trim()
            .split(|c: char| c.is_whitespace() || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
            .to_ascii_uppercase();

        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .unwrap_or(ExecutionStatus::InternalError)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Ok | ExecutionStatus::Created)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
