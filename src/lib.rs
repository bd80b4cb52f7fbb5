#![allow(clippy::doc_markdown)] // Allow technical terms like OpenSSH, ControlMaster in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Signed Executor
//!
//! Authenticated RPC-over-SSH for operating a fleet of DNS and Plesk hosts.
//!
//! ## Overview
//!
//! Every remote action is an [`operations::Operation`] plus arguments. The
//! command string is wrapped in a time-bound Ed25519-signed token, sent as
//! `execute <token>` over a pooled SSH session, and the JSON envelope the
//! remote verifier prints is classified into an
//! [`protocol::ExecutorResponse`] with a closed status taxonomy.
//!
//! ## Architecture
//!
//! Control flow for a request:
//!
//! ```text
//! ExecutorClient ─▶ TokenSigner::sign ─▶ CommandExecutor ─▶ ConnectionPool ─▶ RemoteSession
//!       ▲                                                                        │
//!       └──────────────── protocol::parse ◀──────── RawResult ◀──────────────────┘
//! ```
//!
//! ## Key Features
//!
//! - **Signed tokens**: `timestamp|nonce|expiry|operation` signed with Ed25519,
//!   public key distributed as base64 SPKI DER
//! - **Session pooling**: one multiplexed OpenSSH master per host, created
//!   lazily under an adaptive timeout retry policy and repaired when dead
//! - **Bounded fan-out**: batch execution under a semaphore, results in input
//!   order, per-host failure isolation
//! - **Never-fail façade**: transport and protocol errors become
//!   `INTERNAL_ERROR` responses, so N hosts in always yields N responses out
//!
//! ## Module Organization
//!
//! - [`client`] - Client façade, observer hook and periodic warmup
//! - [`signing`] - Token signer and token wire format
//! - [`execution`] - Connection pool, command executor and batch statistics
//! - [`protocol`] - Response envelope parsing
//! - [`transport`] - Session traits, OpenSSH transport and host directory
//! - [`resilience`] - Adaptive timeout retry policy
//! - [`config`] - YAML configuration with environment overrides
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use signed_executor::client::ExecutorClient;
//! use signed_executor::config::ExecutorConfig;
//! use signed_executor::operations::Operation;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ExecutorClient::bootstrap(&ExecutorConfig::default())?;
//! println!("verifier key: {}", client.public_key_base64()?);
//!
//! let response = client
//!     .execute_on_server("ns1.example.net", &Operation::ns_get_zone_master(), &["example.com"])
//!     .await;
//! println!("{} {}", response.status, response.message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! `test_helpers` provides a scripted in-memory transport, so the whole
//! stack runs in tests without SSH. It is compiled for unit tests and, for
//! integration tests and downstream crates, behind the `test-utils` feature:
//!
//! ```bash
//! cargo test --lib                       # Unit tests
//! cargo test --features test-utils       # Unit and integration tests
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod execution;
pub mod logging;
pub mod operations;
pub mod protocol;
pub mod resilience;
pub mod signing;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;
pub mod transport;

pub use client::{ExecutionObserver, ExecutorClient, TracingObserver, WarmupTask};
pub use config::{ConfigManager, ExecutorConfig};
pub use constants::{system, ExecutionStatus};
pub use error::{ExecutorError, ExecutorResult};
pub use execution::{CommandExecutor, ConnectionPool};
pub use operations::Operation;
pub use protocol::{ExecutorResponse, ProtocolError};
pub use resilience::RetryPolicy;
pub use signing::{SignedToken, SigningError, TokenSigner};
pub use transport::{HostDirectory, RawResult, StaticHostDirectory, TransportError};
