//! # Session Transport
//!
//! Abstractions over the remote shell sessions commands are sent through.
//! The executor only sees [`SessionConnector`] and [`RemoteSession`]; the
//! production implementation in [`openssh`] drives the system OpenSSH client
//! with one multiplexed master connection per host, and
//! `test_helpers` (feature `test-utils`) provides a scripted in-memory
//! implementation.
//!
//! Host names are logical: a [`HostDirectory`] resolves them to addresses
//! before a connector is asked to open a session.

pub mod directory;
pub mod error;
pub mod openssh;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

pub use directory::{HostDirectory, StaticHostDirectory};
pub use error::{TransportError, TransportPhase};
pub use openssh::{OpenSshConnector, OpenSshSession};

/// Unprocessed output of one command run on a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, absent when the remote process was killed by a signal
    pub exit_status: Option<i32>,
}

/// Result of one transport-level command run, as handed to callers.
///
/// `stdout` and `stderr` are trimmed and `None` when empty; benign SSH setup
/// warnings have already been removed from `stderr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub host: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub returncode: Option<i32>,
    pub execution_time: Duration,
}

impl RawResult {
    pub fn succeeded(&self) -> bool {
        self.returncode == Some(0)
    }
}

/// An open remote session bound to exactly one host
#[async_trait]
pub trait RemoteSession: Send + Sync + Debug {
    /// Logical host name the session was opened for
    fn host(&self) -> &str;

    /// Run a command to completion and capture its output
    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Liveness probe used by the pool before reusing a cached session
    async fn is_alive(&self) -> bool;

    /// Tear the session down. Errors are logged, not returned.
    async fn close(&self);
}

/// Factory for remote sessions
#[async_trait]
pub trait SessionConnector: Send + Sync + Debug {
    /// Open a session to `address` on behalf of logical host `host`.
    ///
    /// `timeout` is the budget for this attempt; the caller also enforces it.
    async fn connect(
        &self,
        host: &str,
        address: IpAddr,
        timeout: Duration,
    ) -> Result<Arc<dyn RemoteSession>, TransportError>;
}
