//! Typed response envelope and its parser.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ProtocolError;
use crate::constants::ExecutionStatus;
use crate::transport::RawResult;

/// Classified reply from one host.
///
/// `host` always comes from the transport layer; a `host` key inside the
/// remote JSON is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResponse<T = Value> {
    pub host: String,
    pub status: ExecutionStatus,
    pub code: u16,
    pub message: String,
    pub payload: Option<T>,
}

impl<T> ExecutorResponse<T> {
    /// Local failure reported in place of a remote reply
    pub fn internal_error(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            status: ExecutionStatus::InternalError,
            code: ExecutionStatus::InternalError.code(),
            message: message.into(),
            payload: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl ExecutorResponse<Value> {
    /// Convert the opaque payload into `T`.
    ///
    /// A missing or `null` payload stays `None`; anything else must
    /// deserialize as `T`.
    pub fn try_into_payload<T: DeserializeOwned>(self) -> Result<ExecutorResponse<T>, ProtocolError> {
        let payload = match self.payload {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value).map_err(|e| ProtocolError::PayloadDecode {
                host: self.host.clone(),
                message: e.to_string(),
            })?),
        };

        Ok(ExecutorResponse {
            host: self.host,
            status: self.status,
            code: self.code,
            message: self.message,
            payload,
        })
    }
}

/// Parse the stdout of a raw result into a response envelope
pub fn parse(raw: &RawResult) -> Result<ExecutorResponse, ProtocolError> {
    let host = raw.host.as_str();
    let stdout = match raw.stdout.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => {
            return Err(ProtocolError::EmptyOutput {
                host: host.to_string(),
                stderr: raw.stderr.clone(),
            })
        }
    };

    let document: Value = serde_json::from_str(stdout).map_err(|e| ProtocolError::MalformedJson {
        host: host.to_string(),
        message: e.to_string(),
    })?;

    let Value::Object(mut envelope) = document else {
        return Err(ProtocolError::NotAnObject {
            host: host.to_string(),
        });
    };

    let status = required_field(&envelope, host, "status")?
        .as_str()
        .map(ExecutionStatus::from_wire)
        .ok_or_else(|| invalid_field(host, "status", "a string"))?;

    let code = required_field(&envelope, host, "code")?
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| invalid_field(host, "code", "an integer status code"))?;

    let message = required_field(&envelope, host, "message")?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid_field(host, "message", "a string"))?;

    let payload = match envelope.remove("payload") {
        None | Some(Value::Null) => None,
        Some(value) => Some(value),
    };

    Ok(ExecutorResponse {
        host: host.to_string(),
        status,
        code,
        message,
        payload,
    })
}

fn required_field<'a>(
    envelope: &'a Map<String, Value>,
    host: &str,
    field: &'static str,
) -> Result<&'a Value, ProtocolError> {
    envelope.get(field).ok_or_else(|| ProtocolError::MissingField {
        host: host.to_string(),
        field,
    })
}

fn invalid_field(host: &str, field: &'static str, expected: &'static str) -> ProtocolError {
    ProtocolError::InvalidField {
        host: host.to_string(),
        field,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn raw(host: &str, stdout: Option<&str>) -> RawResult {
        RawResult {
            host: host.to_string(),
            stdout: stdout.map(str::to_string),
            stderr: None,
            returncode: Some(0),
            execution_time: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_parse_well_formed_envelope() {
        let response = parse(&raw(
            "h1",
            Some(r#"{"status":"OK","code":200,"message":"done","payload":{"zonemaster_ip":"203.0.113.5"}}"#),
        ))
        .unwrap();

        assert_eq!(response.host, "h1");
        assert_eq!(response.status, ExecutionStatus::Ok);
        assert_eq!(response.code, 200);
        assert_eq!(response.message, "done");
        assert_eq!(response.payload, Some(json!({"zonemaster_ip": "203.0.113.5"})));
    }

    #[test]
    fn test_host_comes_from_transport() {
        let response = parse(&raw(
            "h1",
            Some(r#"{"host":"spoofed","status":"ok","code":200,"message":"m"}"#),
        ))
        .unwrap();
        assert_eq!(response.host, "h1");
        assert_eq!(response.status, ExecutionStatus::Ok);
        assert_eq!(response.payload, None);
    }

    #[test]
    fn test_unknown_status_is_internal_error() {
        let response = parse(&raw("h1", Some(r#"{"status":"WEIRD","code":599,"message":"x"}"#))).unwrap();
        assert_eq!(response.status, ExecutionStatus::InternalError);
        assert_eq!(response.code, 599);
        assert_eq!(response.message, "x");
    }

    #[test]
    fn test_status_is_normalized() {
        let response = parse(&raw(
            "h1",
            Some(r#"{"status":"  not found ","code":404,"message":"no zone","payload":null}"#),
        ))
        .unwrap();
        assert_eq!(response.status, ExecutionStatus::NotFound);
        assert_eq!(response.payload, None);
    }

    #[test]
    fn test_empty_stdout_is_an_error() {
        assert!(matches!(parse(&raw("h1", None)), Err(ProtocolError::EmptyOutput { .. })));
        assert!(matches!(parse(&raw("h1", Some("   "))), Err(ProtocolError::EmptyOutput { .. })));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            parse(&raw("h1", Some("Traceback (most recent call last)"))),
            Err(ProtocolError::MalformedJson { .. })
        ));
        assert!(matches!(
            parse(&raw("h1", Some("[1, 2]"))),
            Err(ProtocolError::NotAnObject { .. })
        ));
        assert_eq!(
            parse(&raw("h1", Some(r#"{"status":"OK","message":"m"}"#))),
            Err(ProtocolError::MissingField {
                host: "h1".to_string(),
                field: "code"
            })
        );
        assert!(matches!(
            parse(&raw("h1", Some(r#"{"status":"OK","code":"200","message":"m"}"#))),
            Err(ProtocolError::InvalidField { field: "code", .. })
        ));
        assert!(matches!(
            parse(&raw("h1", Some(r#"{"status":7,"code":200,"message":"m"}"#))),
            Err(ProtocolError::InvalidField { field: "status", .. })
        ));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let input = raw("h1", Some(r#"{"status":"CREATED","code":201,"message":"ok","payload":[1,2]}"#));
        assert_eq!(parse(&input), parse(&input));
    }

    #[test]
    fn test_try_into_payload() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct ZoneMaster {
            zonemaster_ip: String,
        }

        let response = parse(&raw(
            "h1",
            Some(r#"{"status":"OK","code":200,"message":"done","payload":{"zonemaster_ip":"203.0.113.5"}}"#),
        ))
        .unwrap();
        let typed: ExecutorResponse<ZoneMaster> = response.clone().try_into_payload().unwrap();
        assert_eq!(
            typed.payload,
            Some(ZoneMaster {
                zonemaster_ip: "203.0.113.5".to_string()
            })
        );

        let mismatch = response.try_into_payload::<Vec<u32>>();
        assert!(matches!(mismatch, Err(ProtocolError::PayloadDecode { .. })));
    }

    #[test]
    fn test_internal_error_envelope() {
        let response: ExecutorResponse = ExecutorResponse::internal_error("h2", "connect failed");
        assert_eq!(response.status, ExecutionStatus::InternalError);
        assert_eq!(response.code, 500);
        assert_eq!(response.payload, None);
        assert!(!response.is_success());
    }
}
