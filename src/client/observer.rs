//! Request/response observation hook.

use std::fmt::Debug;
use std::time::Duration;

use crate::logging::{log_executor_request, log_executor_response};
use crate::protocol::ExecutorResponse;

/// Receives every dispatched command and every classified response.
///
/// Calls are made inline on the request path, so implementations must not
/// block and must not fail.
pub trait ExecutionObserver: Send + Sync + Debug {
    fn log_request(&self, host: &str, command: &str);

    fn log_response(&self, response: &ExecutorResponse, latency: Duration);
}

/// Default observer emitting structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn log_request(&self, host: &str, command: &str) {
        log_executor_request(host, command);
    }

    fn log_response(&self, response: &ExecutorResponse, latency: Duration) {
        log_executor_response(
            &response.host,
            response.status.as_str(),
            response.code,
            &response.message,
            latency,
        );
    }
}
