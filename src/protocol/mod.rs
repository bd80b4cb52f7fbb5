//! # Response Protocol
//!
//! Every remote operation answers with one JSON envelope on stdout:
//!
//! ```json
//! {"status": "OK", "code": 200, "message": "done", "payload": {"zonemaster_ip": "203.0.113.5"}}
//! ```
//!
//! [`parse`] turns a [`RawResult`](crate::transport::RawResult) into an
//! [`ExecutorResponse`] or a [`ProtocolError`]. The payload stays an opaque
//! JSON value until a caller asks for a concrete type with
//! [`ExecutorResponse::try_into_payload`].

pub mod response;

pub use response::{parse, ExecutorResponse};

use thiserror::Error;

/// Malformed replies from a remote host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty response from {host}{}", .stderr.as_deref().map(|s| format!(" (stderr: {s})")).unwrap_or_default())]
    EmptyOutput { host: String, stderr: Option<String> },

    #[error("Malformed JSON from {host}: {message}")]
    MalformedJson { host: String, message: String },

    #[error("Response envelope from {host} is not a JSON object")]
    NotAnObject { host: String },

    #[error("Response envelope from {host} is missing field '{field}'")]
    MissingField { host: String, field: &'static str },

    #[error("Response envelope from {host} has invalid field '{field}': expected {expected}")]
    InvalidField {
        host: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("Payload from {host} could not be decoded: {message}")]
    PayloadDecode { host: String, message: String },
}

impl ProtocolError {
    pub fn host(&self) -> &str {
        match self {
            ProtocolError::EmptyOutput { host, .. }
            | ProtocolError::MalformedJson { host, .. }
            | ProtocolError::NotAnObject { host }
            | ProtocolError::MissingField { host, .. }
            | ProtocolError::InvalidField { host, .. }
            | ProtocolError::PayloadDecode { host, .. } => host,
        }
    }
}
