//! # Execution
//!
//! Session pooling and command execution over the transport layer.
//!
//! - [`pool::ConnectionPool`] owns one reusable session per host
//! - [`executor::CommandExecutor`] runs commands on one host or fans them out
//!   across many with a concurrency cap
//! - [`stats`] summarizes profiled batch runs

pub mod executor;
pub mod pool;
pub mod stats;

pub use executor::{filter_benign_stderr, CommandExecutor};
pub use pool::{ConnectionPool, PoolWarmupReport};
pub use stats::{BatchProfile, HostTiming, LatencyStats};
