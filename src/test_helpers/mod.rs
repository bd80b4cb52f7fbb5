// Test Helpers Module - Scripted Transport
//
// In-memory stand-ins for the SSH transport so pool, executor and client
// behavior can be exercised without a fleet of real hosts. Used by the unit
// tests in this crate and by the integration tests under tests/.

pub mod mock_transport;

pub use mock_transport::{static_directory, MockConnector, MockReply, MockSession};

/// Envelope returned by a [`MockSession`] when no reply was scripted
pub const DEFAULT_OK_ENVELOPE: &str = r#"{"status":"OK","code":200,"message":"ok","payload":null}"#;
