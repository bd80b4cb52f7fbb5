//! # Command Executor
//!
//! Runs a command on one pooled session, or fans it out across many hosts
//! with bounded parallelism. Batch results come back in input order, one per
//! host, and a failing host never cancels or delays the others beyond the
//! shared concurrency cap.

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

use super::pool::ConnectionPool;
use super::stats::{BatchProfile, HostTiming};
use crate::config::ExecutorConfig;
use crate::constants::system;
use crate::resilience::RetryPolicy;
use crate::transport::{CommandOutput, RawResult, TransportError, TransportPhase};

/// Executes commands over sessions from a [`ConnectionPool`]
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    pool: Arc<ConnectionPool>,
    execution_timeout: Duration,
    max_concurrency: usize,
    batch_policy: RetryPolicy,
    slow_host_stddev_factor: f64,
}

#[derive(Debug, Clone, Copy)]
struct PhaseTimings {
    connect: Duration,
    command: Duration,
}

impl CommandExecutor {
    pub fn new(
        pool: Arc<ConnectionPool>,
        execution_timeout: Duration,
        max_concurrency: usize,
        batch_policy: RetryPolicy,
    ) -> Self {
        Self {
            pool,
            execution_timeout,
            max_concurrency: max_concurrency.max(1),
            batch_policy,
            slow_host_stddev_factor: 2.0,
        }
    }

    pub fn from_config(pool: Arc<ConnectionPool>, config: &ExecutorConfig) -> Self {
        Self::new(
            pool,
            config.ssh.execution_timeout(),
            config.batch.max_concurrency,
            config.batch.retry.policy(),
        )
        .with_slow_host_factor(config.batch.slow_host_stddev_factor)
    }

    pub fn with_slow_host_factor(mut self, factor: f64) -> Self {
        self.slow_host_stddev_factor = factor;
        self
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run `command` on `host` once.
    ///
    /// Transport failures are errors; a command that ran and exited non-zero
    /// is returned as data. Execution over an established session is bounded
    /// by the execution timeout and never retried here.
    #[instrument(skip(self, command))]
    pub async fn run_one(&self, host: &str, command: &str) -> Result<RawResult, TransportError> {
        self.run_one_timed(host, command, self.execution_timeout)
            .await
            .map(|(raw, _)| raw)
    }

    /// Acquire a session under the pool's connect policy, then run `command`
    /// bounded by `execute_timeout`. The connect phase is never cut short by
    /// the execute bound.
    async fn run_one_timed(
        &self,
        host: &str,
        command: &str,
        execute_timeout: Duration,
    ) -> Result<(RawResult, PhaseTimings), TransportError> {
        let started = Instant::now();
        let session = self.pool.get(host).await?;
        let connect = started.elapsed();

        let output = tokio::time::timeout(execute_timeout, session.run(command))
            .await
            .map_err(|_| TransportError::timeout(host, TransportPhase::Execute, execute_timeout))??;
        let total = started.elapsed();

        debug!(
            host = %host,
            returncode = ?output.exit_status,
            elapsed_ms = total.as_millis() as u64,
            "Command finished"
        );

        Ok((
            to_raw_result(host, output, total),
            PhaseTimings {
                connect,
                command: total.saturating_sub(connect),
            },
        ))
    }

    /// Run `command` on every host, at most `max_concurrency` at a time.
    ///
    /// Returns exactly one entry per input host, in input order. Retryable
    /// failures are retried per host under the batch retry policy, whose
    /// growing attempt timeout bounds the execute phase. Connect failures
    /// arrive already retried by the pool and end the host's attempts.
    #[instrument(skip(self, hosts, command), fields(host_count = hosts.len(), max_concurrency = self.max_concurrency))]
    pub async fn run_batch(&self, hosts: &[String], command: &str) -> Vec<Result<RawResult, TransportError>> {
        self.fan_out(hosts, command)
            .await
            .into_iter()
            .map(|(result, _)| result.map(|(raw, _)| raw))
            .collect()
    }

    /// [`CommandExecutor::run_batch`] plus per-host timings and summary
    /// statistics
    pub async fn run_batch_profiled(
        &self,
        hosts: &[String],
        command: &str,
    ) -> (Vec<Result<RawResult, TransportError>>, BatchProfile) {
        let started = Instant::now();
        let outcomes = self.fan_out(hosts, command).await;
        let wall_time = started.elapsed();

        let mut results = Vec::with_capacity(outcomes.len());
        let mut timings = Vec::with_capacity(outcomes.len());
        for (host, (result, total)) in hosts.iter().zip(outcomes) {
            match result {
                Ok((raw, phases)) => {
                    timings.push(HostTiming {
                        host: host.clone(),
                        connect: Some(phases.connect),
                        command: Some(phases.command),
                        total,
                        succeeded: true,
                    });
                    results.push(Ok(raw));
                }
                Err(e) => {
                    timings.push(HostTiming {
                        host: host.clone(),
                        connect: None,
                        command: None,
                        total,
                        succeeded: false,
                    });
                    results.push(Err(e));
                }
            }
        }

        let profile = BatchProfile::from_timings(timings, self.slow_host_stddev_factor, wall_time);
        profile.log_summary();
        (results, profile)
    }

    async fn fan_out(
        &self,
        hosts: &[String],
        command: &str,
    ) -> Vec<(Result<(RawResult, PhaseTimings), TransportError>, Duration)> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let tasks = hosts.iter().map(|host| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (Err(TransportError::io(host.as_str(), e)), Duration::ZERO),
                };
                let started = Instant::now();
                let result = self
                    .batch_policy
                    .retry(host, TransportPhase::Execute, |_, timeout| {
                        self.run_one_timed(host, command, timeout)
                    })
                    .await;
                (result, started.elapsed())
            }
        });

        join_all(tasks).await
    }
}

/// Normalize session output: trimmed streams, absent when empty, with benign
/// SSH warnings removed from stderr
pub(crate) fn to_raw_result(host: &str, output: CommandOutput, execution_time: Duration) -> RawResult {
    let stdout = output.stdout.trim();
    RawResult {
        host: host.to_string(),
        stdout: (!stdout.is_empty()).then(|| stdout.to_string()),
        stderr: filter_benign_stderr(&output.stderr),
        returncode: output.exit_status,
        execution_time,
    }
}

/// Drop lines that only announce SSH session setup, e.g. known-hosts
/// additions. Returns `None` when nothing else remains.
pub fn filter_benign_stderr(stderr: &str) -> Option<String> {
    let kept: Vec<&str> = stderr
        .lines()
        .filter(|line| {
            let lowered = line.trim_start().to_lowercase();
            !system::BENIGN_STDERR_PREFIXES
                .iter()
                .any(|prefix| lowered.starts_with(prefix))
        })
        .collect();

    let joined = kept.join("\n");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
