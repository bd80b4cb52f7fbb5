//! # Connection Pool
//!
//! One reusable remote session per logical host. Sessions are opened lazily
//! on first use, replaced when a liveness probe finds them dead, and closed
//! only by [`ConnectionPool::close_all`].
//!
//! Each host owns an async mutex slot, so concurrent first callers for the
//! same host wait for one connect instead of racing to open duplicates, while
//! different hosts never block each other.

use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument, warn};

use crate::config::PoolConfig;
use crate::logging::log_pool_operation;
use crate::resilience::RetryPolicy;
use crate::transport::{HostDirectory, RemoteSession, SessionConnector, TransportError, TransportPhase};

type SessionSlot = Arc<Mutex<Option<Arc<dyn RemoteSession>>>>;

/// Outcome of pre-warming sessions for a set of hosts
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolWarmupReport {
    pub ready: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl PoolWarmupReport {
    pub fn all_ready(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-host session cache with bounded-retry creation
#[derive(Debug)]
pub struct ConnectionPool {
    connector: Arc<dyn SessionConnector>,
    directory: Arc<dyn HostDirectory>,
    connect_policy: RetryPolicy,
    warmup_concurrency: usize,
    slots: DashMap<String, SessionSlot>,
}

impl ConnectionPool {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        directory: Arc<dyn HostDirectory>,
        connect_policy: RetryPolicy,
        warmup_concurrency: usize,
    ) -> Self {
        Self {
            connector,
            directory,
            connect_policy,
            warmup_concurrency: warmup_concurrency.max(1),
            slots: DashMap::new(),
        }
    }

    pub fn from_config(
        connector: Arc<dyn SessionConnector>,
        directory: Arc<dyn HostDirectory>,
        config: &PoolConfig,
    ) -> Self {
        Self::new(
            connector,
            directory,
            config.connect_retry.policy(),
            config.warmup_concurrency,
        )
    }

    pub fn connect_policy(&self) -> &RetryPolicy {
        &self.connect_policy
    }

    /// Slot for `host`. Hosts the directory cannot resolve never get one.
    fn slot(&self, host: &str) -> Result<SessionSlot, TransportError> {
        // Clone the slot out so no map shard lock is held across an await
        if let Some(entry) = self.slots.get(host) {
            return Ok(entry.value().clone());
        }
        if self.directory.resolve(host).is_none() {
            return Err(host_not_found(host));
        }
        Ok(self
            .slots
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone())
    }

    /// Session for `host`, reusing a live cached one when possible
    pub async fn get(&self, host: &str) -> Result<Arc<dyn RemoteSession>, TransportError> {
        let slot = self.slot(host)?;
        let mut cached = slot.lock().await;

        if let Some(session) = cached.take() {
            if session.is_alive().await {
                *cached = Some(session.clone());
                return Ok(session);
            }
            warn!(host = %host, "💀 Pooled session is dead, recreating");
            session.close().await;
        }

        let session = self.create(host).await?;
        *cached = Some(session.clone());
        Ok(session)
    }

    /// Open a fresh session for `host` under the connect retry policy.
    ///
    /// The session is not cached; [`ConnectionPool::get`] does that.
    #[instrument(skip(self), fields(max_attempts = self.connect_policy.max_attempts))]
    pub async fn create(&self, host: &str) -> Result<Arc<dyn RemoteSession>, TransportError> {
        let address = self
            .directory
            .resolve(host)
            .ok_or_else(|| host_not_found(host))?;

        let started = Instant::now();
        let result = self
            .connect_policy
            .run(host, TransportPhase::Connect, |attempt, timeout| {
                debug!(
                    host = %host,
                    address = %address,
                    attempt = attempt + 1,
                    timeout_ms = timeout.as_millis() as u64,
                    "Opening remote session"
                );
                self.connector.connect(host, address, timeout)
            })
            .await;
        let duration_ms = Some(started.elapsed().as_millis() as u64);

        match &result {
            Ok(_) => log_pool_operation("create", Some(host), "connected", duration_ms, None),
            Err(e) => log_pool_operation(
                "create",
                Some(host),
                "failed",
                duration_ms,
                Some(&e.to_string()),
            ),
        }
        result
    }

    /// Pre-warm sessions for `hosts`, at most `warmup_concurrency` connects
    /// at a time. Failures are reported per host and never abort the others.
    pub async fn initialize_all(&self, hosts: &[String]) -> PoolWarmupReport {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.warmup_concurrency));

        let attempts = hosts.iter().map(|host| {
            let semaphore = semaphore.clone();
            async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => self.get(host).await.map(|_| ()),
                    Err(e) => Err(TransportError::io(host.as_str(), e)),
                };
                (host.clone(), outcome)
            }
        });

        let mut report = PoolWarmupReport::default();
        for (host, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => report.ready.push(host),
                Err(e) => report.failed.push((host, e.to_string())),
            }
        }
        report.elapsed = started.elapsed();

        info!(
            ready = report.ready.len(),
            failed = report.failed.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "🔥 Connection pool warmup complete"
        );
        report
    }

    /// Close every pooled session
    pub async fn close_all(&self) {
        let slots: Vec<(String, SessionSlot)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut closed = 0usize;
        for (host, slot) in slots {
            if let Some(session) = slot.lock().await.take() {
                session.close().await;
                closed += 1;
                debug!(host = %host, "Closed pooled session");
            }
        }
        self.slots.clear();

        log_pool_operation("close_all", None, "closed", None, Some(&format!("{closed} sessions")));
    }

    /// Hosts with an open cached session
    pub async fn pooled_hosts(&self) -> Vec<String> {
        let slots: Vec<(String, SessionSlot)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut hosts = Vec::new();
        for (host, slot) in slots {
            if slot.lock().await.is_some() {
                hosts.push(host);
            }
        }
        hosts.sort();
        hosts
    }

    pub async fn contains(&self, host: &str) -> bool {
        let slot = self.slots.get(host).map(|entry| entry.value().clone());
        match slot {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }
}

fn host_not_found(host: &str) -> TransportError {
    TransportError::HostNotFound {
        host: host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{static_directory, MockConnector};

    fn pool(connector: &MockConnector, hosts: &[&str]) -> ConnectionPool {
        ConnectionPool::new(
            Arc::new(connector.clone()),
            static_directory(hosts),
            RetryPolicy::new(Duration::from_millis(100), 2.0, Duration::from_millis(400), 3),
            4,
        )
    }

    #[tokio::test]
    async fn test_get_reuses_live_session() {
        let connector = MockConnector::new();
        let pool = pool(&connector, &["h1"]);

        let first = pool.get("h1").await.unwrap();
        let second = pool.get("h1").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connect_count("h1"), 1);
        assert!(pool.contains("h1").await);
    }

    #[tokio::test]
    async fn test_dead_session_is_replaced_once() {
        let connector = MockConnector::new();
        let pool = pool(&connector, &["h1"]);

        pool.get("h1").await.unwrap();
        connector.kill_session("h1");

        let replacement = pool.get("h1").await.unwrap();
        assert!(replacement.is_alive().await);
        assert_eq!(connector.connect_count("h1"), 2);
        assert_eq!(connector.closed_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_connects_once() {
        let connector = MockConnector::new();
        connector.set_connect_delay(Duration::from_millis(20));
        let pool = Arc::new(pool(&connector, &["h1"]));

        let callers = (0..8).map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get("h1").await.map(|_| ()) })
        });
        for result in join_all(callers).await {
            result.unwrap().unwrap();
        }

        assert_eq!(connector.connect_count("h1"), 1);
    }

    #[tokio::test]
    async fn test_unknown_host_is_not_found() {
        let connector = MockConnector::new();
        let pool = pool(&connector, &["h1"]);

        let error = pool.get("nowhere").await.unwrap_err();
        assert_eq!(
            error,
            TransportError::HostNotFound {
                host: "nowhere".to_string()
            }
        );
        assert_eq!(connector.total_connects(), 0);

        for typo in ["nowhere", "ns1.exmaple.net", "nowhere"] {
            assert!(pool.get(typo).await.is_err());
        }
        assert!(pool.slots.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_connect_budget() {
        let connector = MockConnector::new();
        connector.unreachable("h2");
        let pool = pool(&connector, &["h2"]);

        let error = pool.get("h2").await.unwrap_err();
        assert!(matches!(
            error,
            TransportError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(connector.connect_count("h2"), 3);
        assert!(!pool.contains("h2").await);
    }

    #[tokio::test]
    async fn test_permission_denied_is_not_retried() {
        let connector = MockConnector::new();
        connector.deny("h3");
        let pool = pool(&connector, &["h3"]);

        let error = pool.get("h3").await.unwrap_err();
        assert!(matches!(error, TransportError::PermissionDenied { .. }));
        assert_eq!(connector.connect_count("h3"), 1);
    }

    #[tokio::test]
    async fn test_initialize_all_reports_per_host() {
        let connector = MockConnector::new();
        connector.unreachable("bad");
        let pool = pool(&connector, &["a", "b", "bad"]);

        let hosts: Vec<String> = ["a", "bad", "b"].iter().map(|h| h.to_string()).collect();
        let report = pool.initialize_all(&hosts).await;

        assert_eq!(report.ready, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert!(!report.all_ready());
        assert_eq!(pool.pooled_hosts().await, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_all_caps_concurrent_connects() {
        let connector = MockConnector::new();
        connector.set_connect_delay(Duration::from_millis(50));
        let hosts: Vec<String> = (0..10).map(|i| format!("h{i}")).collect();
        let host_refs: Vec<&str> = hosts.iter().map(String::as_str).collect();
        let pool = pool(&connector, &host_refs);

        let report = pool.initialize_all(&hosts).await;

        assert!(report.all_ready());
        assert_eq!(connector.total_connects(), 10);
        assert_eq!(connector.max_connects_in_flight(), 4);
    }

    #[tokio::test]
    async fn test_close_all_closes_every_session() {
        let connector = MockConnector::new();
        let pool = pool(&connector, &["a", "b"]);
        pool.get("a").await.unwrap();
        pool.get("b").await.unwrap();

        pool.close_all().await;

        assert_eq!(connector.closed_count(), 2);
        assert!(pool.pooled_hosts().await.is_empty());
    }
}
