//! # Resilience Module
//!
//! Bounded retry for remote session work. Both connection establishment and
//! the per-host batch attempt run under a [`RetryPolicy`], so no remote call
//! can suspend indefinitely.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use signed_executor::resilience::RetryPolicy;
//! use signed_executor::transport::{TransportError, TransportPhase};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), TransportError> {
//! let policy = RetryPolicy::new(Duration::from_secs(3), 2.0, Duration::from_secs(12), 3);
//!
//! let value = policy
//!     .run("plesk1.example.net", TransportPhase::Connect, |_attempt, _timeout| async {
//!         Ok::<_, TransportError>("connected")
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::RetryPolicy;
