//! Scripted in-memory [`SessionConnector`] / [`RemoteSession`] pair.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::DEFAULT_OK_ENVELOPE;
use crate::transport::{
    CommandOutput, RemoteSession, SessionConnector, StaticHostDirectory, TransportError,
};

/// What a mock session answers for one host
#[derive(Debug, Clone)]
pub enum MockReply {
    Output(CommandOutput),
    Error(TransportError),
}

#[derive(Debug, Default)]
struct MockState {
    replies: Mutex<HashMap<String, MockReply>>,
    unreachable: Mutex<HashSet<String>>,
    denied: Mutex<HashSet<String>>,
    connect_delay: Mutex<Option<Duration>>,
    run_delay: Mutex<Option<Duration>>,
    connects: Mutex<HashMap<String, u32>>,
    commands: Mutex<Vec<(String, String)>>,
    sessions: Mutex<HashMap<String, Arc<MockSession>>>,
    closed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    connects_in_flight: AtomicUsize,
    max_connects_in_flight: AtomicUsize,
}

/// Connector whose sessions answer from a per-host script.
///
/// Cloning shares the script and the recorded history, so a test can keep a
/// handle after giving the connector to a pool.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `stdout` and exit status 0
    pub fn reply(&self, host: &str, stdout: &str) -> &Self {
        self.reply_with(
            host,
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_status: Some(0),
            },
        )
    }

    pub fn reply_with(&self, host: &str, output: CommandOutput) -> &Self {
        self.state
            .replies
            .lock()
            .insert(host.to_string(), MockReply::Output(output));
        self
    }

    /// Make every command on `host` fail with `error`
    pub fn fail_run(&self, host: &str, error: TransportError) -> &Self {
        self.state
            .replies
            .lock()
            .insert(host.to_string(), MockReply::Error(error));
        self
    }

    /// Connects to `host` fail with a retryable connection error
    pub fn unreachable(&self, host: &str) -> &Self {
        self.state.unreachable.lock().insert(host.to_string());
        self
    }

    /// Connects to `host` fail with a permanent authentication error
    pub fn deny(&self, host: &str) -> &Self {
        self.state.denied.lock().insert(host.to_string());
        self
    }

    pub fn set_connect_delay(&self, delay: Duration) -> &Self {
        *self.state.connect_delay.lock() = Some(delay);
        self
    }

    pub fn set_run_delay(&self, delay: Duration) -> &Self {
        *self.state.run_delay.lock() = Some(delay);
        self
    }

    /// Mark the current session for `host` dead, as if its master exited
    pub fn kill_session(&self, host: &str) {
        if let Some(session) = self.state.sessions.lock().get(host) {
            session.alive.store(false, Ordering::SeqCst);
        }
    }

    pub fn connect_count(&self, host: &str) -> u32 {
        self.state.connects.lock().get(host).copied().unwrap_or(0)
    }

    pub fn total_connects(&self) -> u32 {
        self.state.connects.lock().values().sum()
    }

    /// Every `(host, command)` run so far, in arrival order
    pub fn commands(&self) -> Vec<(String, String)> {
        self.state.commands.lock().clone()
    }

    pub fn closed_count(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Highest number of commands observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of connects observed in progress at the same time
    pub fn max_connects_in_flight(&self) -> usize {
        self.state.max_connects_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(
        &self,
        host: &str,
        _address: IpAddr,
        _timeout: Duration,
    ) -> Result<Arc<dyn RemoteSession>, TransportError> {
        *self.state.connects.lock().entry(host.to_string()).or_insert(0) += 1;
        let _guard = InFlight::enter(&self.state.connects_in_flight, &self.state.max_connects_in_flight);

        let delay = *self.state.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.denied.lock().contains(host) {
            return Err(TransportError::permission_denied(host, "Permission denied (publickey)"));
        }
        if self.state.unreachable.lock().contains(host) {
            return Err(TransportError::connection_lost(host, "Connection refused"));
        }

        let session = Arc::new(MockSession {
            host: host.to_string(),
            alive: AtomicBool::new(true),
            state: self.state.clone(),
        });
        self.state
            .sessions
            .lock()
            .insert(host.to_string(), session.clone());
        Ok(session)
    }
}

/// Session handed out by [`MockConnector`]
#[derive(Debug)]
pub struct MockSession {
    host: String,
    alive: AtomicBool,
    state: Arc<MockState>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    /// Count one more in-flight call and record the new high-water mark
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(current)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let _guard = InFlight::enter(&self.state.in_flight, &self.state.max_in_flight);

        self.state
            .commands
            .lock()
            .push((self.host.clone(), command.to_string()));

        let delay = *self.state.run_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::connection_lost(&self.host, "control socket gone"));
        }

        let reply = self.state.replies.lock().get(&self.host).cloned();
        match reply {
            Some(MockReply::Output(output)) => Ok(output),
            Some(MockReply::Error(error)) => Err(error),
            None => Ok(CommandOutput {
                stdout: DEFAULT_OK_ENVELOPE.to_string(),
                stderr: String::new(),
                exit_status: Some(0),
            }),
        }
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Directory mapping each host to a distinct TEST-NET-1 address
pub fn static_directory(hosts: &[&str]) -> Arc<StaticHostDirectory> {
    let directory = StaticHostDirectory::new();
    for (index, host) in hosts.iter().enumerate() {
        let last_octet = u8::try_from(index % 250 + 1).unwrap_or(1);
        directory.add_mapping(*host, vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, last_octet))]);
    }
    Arc::new(directory)
}
