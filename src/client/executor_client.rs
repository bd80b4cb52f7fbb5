//! Client façade over signing, execution and response parsing.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use super::observer::{ExecutionObserver, TracingObserver};
use super::warmup::WarmupTask;
use crate::config::ExecutorConfig;
use crate::constants::system;
use crate::error::ExecutorResult;
use crate::execution::{CommandExecutor, ConnectionPool, PoolWarmupReport};
use crate::logging::log_error;
use crate::operations::Operation;
use crate::protocol::{self, ExecutorResponse};
use crate::signing::{SigningError, TokenSigner};
use crate::transport::{
    HostDirectory, OpenSshConnector, RawResult, SessionConnector, StaticHostDirectory, TransportError,
};

/// Signs operations, runs them on one or many hosts and returns one typed
/// response per host.
///
/// Nothing past this boundary is an error: transport and protocol failures
/// become `INTERNAL_ERROR` responses for the host they happened on.
#[derive(Debug)]
pub struct ExecutorClient {
    signer: Arc<TokenSigner>,
    executor: CommandExecutor,
    observer: Arc<dyn ExecutionObserver>,
    profiling_enabled: bool,
    warmup: Mutex<Option<WarmupTask>>,
}

impl ExecutorClient {
    pub fn new(signer: Arc<TokenSigner>, executor: CommandExecutor) -> Self {
        Self {
            signer,
            executor,
            observer: Arc::new(TracingObserver),
            profiling_enabled: false,
            warmup: Mutex::new(None),
        }
    }

    /// Build the production client: OpenSSH transport and a static host
    /// directory seeded from the `hosts` section
    pub fn bootstrap(config: &ExecutorConfig) -> ExecutorResult<Self> {
        let directory = Arc::new(StaticHostDirectory::from_map(config.hosts.clone()));
        let connector = Arc::new(OpenSshConnector::new(config.ssh.clone()));
        Self::bootstrap_with(config, connector, directory)
    }

    /// Build a client from configuration with an explicit transport and
    /// directory
    pub fn bootstrap_with(
        config: &ExecutorConfig,
        connector: Arc<dyn SessionConnector>,
        directory: Arc<dyn HostDirectory>,
    ) -> ExecutorResult<Self> {
        config.validate()?;
        let signer = TokenSigner::from_config(&config.signing).inspect_err(|e| {
            log_error(
                "client",
                "load_signing_key",
                &e.to_string(),
                Some(&format!("key_directory={:?}", config.signing.key_directory)),
            );
        })?;
        let signer = Arc::new(signer);
        let pool = Arc::new(ConnectionPool::from_config(connector, directory, &config.pool));
        let executor = CommandExecutor::from_config(pool, config);

        info!(
            environment = %config.environment,
            hosts = config.hosts.len(),
            max_concurrency = executor.max_concurrency(),
            "✅ Executor client ready"
        );

        Ok(Self::new(signer, executor).with_profiling(config.batch.profiling_enabled))
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling_enabled = enabled;
        self
    }

    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        self.executor.pool()
    }

    /// Base64 SPKI DER public key for remote verifiers
    pub fn public_key_base64(&self) -> Result<String, SigningError> {
        self.signer.public_key_base64()
    }

    /// Run `operation` with `args` on one host
    #[instrument(skip(self, operation, args), fields(operation = %operation))]
    pub async fn execute_on_server<S: AsRef<str>>(
        &self,
        host: &str,
        operation: &Operation,
        args: &[S],
    ) -> ExecutorResponse {
        let started = Instant::now();
        let command = operation.with_args(args);
        self.observer.log_request(host, &command);

        let response = match self.wire_command(&command) {
            Ok(wire) => classify(host, self.executor.run_one(host, &wire).await),
            Err(e) => ExecutorResponse::internal_error(host, e.to_string()),
        };

        self.observer.log_response(&response, started.elapsed());
        response
    }

    /// Run `operation` with `args` on every host. The token is signed once
    /// and the result has one response per input host, in input order.
    #[instrument(skip(self, hosts, operation, args), fields(operation = %operation, host_count = hosts.len()))]
    pub async fn execute_on_servers<S: AsRef<str>>(
        &self,
        hosts: &[String],
        operation: &Operation,
        args: &[S],
    ) -> Vec<ExecutorResponse> {
        let started = Instant::now();
        let command = operation.with_args(args);
        for host in hosts {
            self.observer.log_request(host, &command);
        }

        let wire = match self.wire_command(&command) {
            Ok(wire) => wire,
            Err(e) => {
                let message = e.to_string();
                return hosts
                    .iter()
                    .map(|host| {
                        let response = ExecutorResponse::internal_error(host.as_str(), message.clone());
                        self.observer.log_response(&response, started.elapsed());
                        response
                    })
                    .collect();
            }
        };

        let results = if self.profiling_enabled {
            self.executor.run_batch_profiled(hosts, &wire).await.0
        } else {
            self.executor.run_batch(hosts, &wire).await
        };
        let batch_elapsed = started.elapsed();

        hosts
            .iter()
            .zip(results)
            .map(|(host, result)| {
                let latency = result
                    .as_ref()
                    .map(|raw| raw.execution_time)
                    .unwrap_or(batch_elapsed);
                let response = classify(host, result);
                self.observer.log_response(&response, latency);
                response
            })
            .collect()
    }

    /// [`ExecutorClient::execute_on_server`] with the payload decoded as `T`
    pub async fn execute_on_server_as<T: DeserializeOwned, S: AsRef<str>>(
        &self,
        host: &str,
        operation: &Operation,
        args: &[S],
    ) -> ExecutorResponse<T> {
        into_typed(self.execute_on_server(host, operation, args).await)
    }

    /// [`ExecutorClient::execute_on_servers`] with every payload decoded as `T`
    pub async fn execute_on_servers_as<T: DeserializeOwned, S: AsRef<str>>(
        &self,
        hosts: &[String],
        operation: &Operation,
        args: &[S],
    ) -> Vec<ExecutorResponse<T>> {
        self.execute_on_servers(hosts, operation, args)
            .await
            .into_iter()
            .map(into_typed)
            .collect()
    }

    /// Open sessions to `hosts` ahead of the first request
    pub async fn warm_up(&self, hosts: &[String]) -> PoolWarmupReport {
        self.pool().initialize_all(hosts).await
    }

    /// Start the periodic warmup loop for `hosts`, replacing any running one
    pub async fn start_warmup(&self, hosts: Vec<String>, interval: Duration) {
        let task = WarmupTask::start(self.signer.clone(), self.executor.clone(), hosts, interval);
        let previous = self.warmup.lock().replace(task);
        if let Some(previous) = previous {
            previous.stop().await;
        }
    }

    /// Stop the warmup loop and close every pooled session
    pub async fn shutdown(&self) {
        let warmup = self.warmup.lock().take();
        if let Some(task) = warmup {
            task.stop().await;
        }
        self.pool().close_all().await;
        info!("🛑 Executor client shut down");
    }

    fn wire_command(&self, command: &str) -> Result<String, SigningError> {
        let token = self.signer.sign(command)?;
        Ok(format!("{} {}", system::REMOTE_EXECUTE_VERB, token))
    }
}

/// Collapse a transport outcome into a response for `host`
fn classify(host: &str, result: Result<RawResult, TransportError>) -> ExecutorResponse {
    match result {
        Ok(raw) => protocol::parse(&raw)
            .unwrap_or_else(|e| ExecutorResponse::internal_error(host, e.to_string())),
        Err(e) => ExecutorResponse::internal_error(host, e.to_string()),
    }
}

fn into_typed<T: DeserializeOwned>(response: ExecutorResponse) -> ExecutorResponse<T> {
    let host = response.host.clone();
    response
        .try_into_payload()
        .unwrap_or_else(|e| ExecutorResponse::internal_error(host, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ExecutionStatus;
    use crate::resilience::RetryPolicy;
    use crate::signing::SignedToken;
    use crate::test_helpers::{static_directory, MockConnector};
    use serde::Deserialize;
    use serde_json::json;

    const ZONE_MASTER_REPLY: &str =
        r#"{"status":"OK","code":200,"message":"done","payload":{"zonemaster_ip":"203.0.113.5"}}"#;

    fn client(connector: &MockConnector, hosts: &[&str]) -> ExecutorClient {
        let pool = ConnectionPool::new(
            Arc::new(connector.clone()),
            static_directory(hosts),
            RetryPolicy::new(Duration::from_millis(100), 2.0, Duration::from_millis(400), 3),
            10,
        );
        let executor = CommandExecutor::new(
            Arc::new(pool),
            Duration::from_secs(1),
            10,
            RetryPolicy::new(Duration::from_secs(5), 2.0, Duration::from_secs(20), 2),
        );
        ExecutorClient::new(Arc::new(TokenSigner::generate(900).unwrap()), executor)
    }

    #[tokio::test]
    async fn test_single_host_sends_signed_command() {
        let connector = MockConnector::new();
        connector.reply("h1", ZONE_MASTER_REPLY);
        let client = client(&connector, &["h1"]);

        let response = client
            .execute_on_server("h1", &Operation::ns_get_zone_master(), &["example.com"])
            .await;

        assert_eq!(response.status, ExecutionStatus::Ok);
        assert_eq!(response.payload, Some(json!({"zonemaster_ip": "203.0.113.5"})));

        let commands = connector.commands();
        assert_eq!(commands.len(), 1);
        let token = commands[0]
            .1
            .strip_prefix("execute ")
            .expect("wire command starts with the execute verb");
        let token = SignedToken::decode(token).unwrap();
        assert_eq!(token.operation, "NS.GET_ZONE_MASTER example.com");
        assert!(token
            .verify(&client.signer().verifying_key(), token.timestamp)
            .is_ok());
    }

    #[tokio::test]
    async fn test_transport_error_becomes_internal_error() {
        let connector = MockConnector::new();
        connector.deny("h1");
        let client = client(&connector, &["h1"]);

        let response = client
            .execute_on_server("h1", &Operation::plesk_restart_dns_service(), &["example.com"])
            .await;

        assert_eq!(response.host, "h1");
        assert_eq!(response.status, ExecutionStatus::InternalError);
        assert_eq!(response.code, 500);
        assert_eq!(response.payload, None);
        assert!(response.message.contains("Permission denied"));
    }

    #[tokio::test]
    async fn test_protocol_error_becomes_internal_error() {
        let connector = MockConnector::new();
        connector.reply("h1", "");
        let client = client(&connector, &["h1"]);

        let response = client
            .execute_on_server("h1", &Operation::ns_remove_zone(), &["example.com"])
            .await;
        assert_eq!(response.status, ExecutionStatus::InternalError);
        assert!(response.message.contains("Empty response"));
    }

    #[tokio::test]
    async fn test_batch_signs_once_and_preserves_order() {
        let connector = MockConnector::new();
        connector.reply("h1", ZONE_MASTER_REPLY);
        connector.unreachable("h2");
        let client = client(&connector, &["h1", "h2", "h3"]);

        let hosts = vec!["h2".to_string(), "h1".to_string(), "h3".to_string()];
        let responses = client
            .execute_on_servers(&hosts, &Operation::ns_get_zone_master(), &["example.com"])
            .await;

        let seen: Vec<&str> = responses.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(seen, vec!["h2", "h1", "h3"]);
        assert_eq!(responses[0].status, ExecutionStatus::InternalError);
        assert_eq!(responses[1].status, ExecutionStatus::Ok);
        assert_eq!(responses[2].status, ExecutionStatus::Ok);

        let tokens: Vec<String> = connector.commands().into_iter().map(|(_, c)| c).collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0], tokens[1]);
    }

    #[tokio::test]
    async fn test_typed_payload_and_decode_failure() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct ZoneMaster {
            zonemaster_ip: String,
        }
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct LoginLink {
            url: String,
        }

        let connector = MockConnector::new();
        connector.reply("h1", ZONE_MASTER_REPLY);
        let client = client(&connector, &["h1"]);

        let typed: ExecutorResponse<ZoneMaster> = client
            .execute_on_server_as("h1", &Operation::ns_get_zone_master(), &["example.com"])
            .await;
        assert_eq!(typed.payload.unwrap().zonemaster_ip, "203.0.113.5");

        let mismatched: ExecutorResponse<LoginLink> = client
            .execute_on_server_as("h1", &Operation::plesk_get_login_link(), &["example.com"])
            .await;
        assert_eq!(mismatched.status, ExecutionStatus::InternalError);
        assert!(mismatched.payload.is_none());
    }

    #[test]
    fn test_bootstrap_fails_on_corrupt_signing_key() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("priv.key"), b"not a key").unwrap();
        std::fs::write(dir.path().join("pub.key"), b"irrelevant").unwrap();

        let mut config = ExecutorConfig::default();
        config.signing.key_directory = Some(dir.path().to_path_buf());

        let result = ExecutorClient::bootstrap_with(
            &config,
            Arc::new(MockConnector::new()),
            static_directory(&["h1"]),
        );
        assert!(matches!(
            result,
            Err(crate::error::ExecutorError::Signing(SigningError::InvalidKey(_)))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_pool() {
        let connector = MockConnector::new();
        let client = client(&connector, &["a", "b"]);
        let hosts = vec!["a".to_string(), "b".to_string()];

        let report = client.warm_up(&hosts).await;
        assert!(report.all_ready());

        client.shutdown().await;
        assert_eq!(connector.closed_count(), 2);
        assert!(client.pool().pooled_hosts().await.is_empty());
    }
}
