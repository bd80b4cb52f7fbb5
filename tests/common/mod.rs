//! Shared helpers for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use signed_executor::client::{ExecutionObserver, ExecutorClient};
use signed_executor::config::ExecutorConfig;
use signed_executor::protocol::ExecutorResponse;
use signed_executor::test_helpers::{static_directory, MockConnector};
use std::sync::Arc;
use std::time::Duration;

pub const ZONE_MASTER_REPLY: &str =
    r#"{"status":"OK","code":200,"message":"done","payload":{"zonemaster_ip":"203.0.113.5"}}"#;

/// Configuration with short timeouts and every host mapped to an address
pub fn test_config(hosts: &[&str]) -> ExecutorConfig {
    let mut config = ExecutorConfig {
        environment: "test".to_string(),
        ..ExecutorConfig::default()
    };
    config.pool.connect_retry.base_timeout_ms = 200;
    config.pool.connect_retry.max_timeout_ms = 800;
    config.batch.retry.base_timeout_ms = 2_000;
    config.batch.retry.max_timeout_ms = 4_000;
    for (index, host) in hosts.iter().enumerate() {
        let address = format!("192.0.2.{}", index % 250 + 1).parse().unwrap();
        config.hosts.insert(host.to_string(), vec![address]);
    }
    config
}

pub fn build_client(connector: &MockConnector, config: &ExecutorConfig) -> ExecutorClient {
    let hosts: Vec<&str> = config.hosts.keys().map(String::as_str).collect();
    ExecutorClient::bootstrap_with(config, Arc::new(connector.clone()), static_directory(&hosts))
        .expect("client bootstraps from a valid config")
}

pub fn host_list(hosts: &[&str]) -> Vec<String> {
    hosts.iter().map(|h| h.to_string()).collect()
}

/// Observer that records what it sees
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub requests: Mutex<Vec<(String, String)>>,
    pub responses: Mutex<Vec<(String, u16, Duration)>>,
}

impl ExecutionObserver for RecordingObserver {
    fn log_request(&self, host: &str, command: &str) {
        self.requests.lock().push((host.to_string(), command.to_string()));
    }

    fn log_response(&self, response: &ExecutorResponse, latency: Duration) {
        self.responses
            .lock()
            .push((response.host.clone(), response.code, latency));
    }
}
