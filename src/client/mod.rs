//! # Executor Client
//!
//! The entry point callers use. [`ExecutorClient`] signs an operation, runs
//! it on one or many hosts and always hands back one
//! [`ExecutorResponse`](crate::protocol::ExecutorResponse) per host.
//!
//! ```rust,no_run
//! use signed_executor::client::ExecutorClient;
//! use signed_executor::config::ConfigManager;
//! use signed_executor::operations::Operation;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let client = ExecutorClient::bootstrap(manager.config())?;
//!
//! let hosts = vec!["ns1.example.net".to_string(), "ns2.example.net".to_string()];
//! let responses = client
//!     .execute_on_servers(&hosts, &Operation::ns_get_zone_master(), &["example.com"])
//!     .await;
//! for response in responses {
//!     println!("{} {} {}", response.host, response.status, response.message);
//! }
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod executor_client;
pub mod observer;
pub mod warmup;

pub use executor_client::ExecutorClient;
pub use observer::{ExecutionObserver, TracingObserver};
pub use warmup::WarmupTask;
