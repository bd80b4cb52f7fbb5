//! Periodic session warmup.
//!
//! Multiplexed SSH masters that sit idle long enough get dropped by
//! firewalls and remote sshd timeouts. The warmup task sends a cheap signed
//! `EXECUTOR.STATUS` to the whole fleet on a fixed interval so pooled
//! sessions stay established between real requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::system;
use crate::execution::CommandExecutor;
use crate::logging::log_error;
use crate::operations::Operation;
use crate::signing::TokenSigner;

/// Handle to a running warmup loop
#[derive(Debug)]
pub struct WarmupTask {
    task_id: Uuid,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    cycles: Arc<AtomicU64>,
}

impl WarmupTask {
    /// Spawn the warmup loop. The first cycle runs immediately.
    pub fn start(
        signer: Arc<TokenSigner>,
        executor: CommandExecutor,
        hosts: Vec<String>,
        interval: Duration,
    ) -> Self {
        let task_id = Uuid::new_v4();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cycles = Arc::new(AtomicU64::new(0));
        let cycle_counter = cycles.clone();

        info!(
            task_id = %task_id,
            hosts = hosts.len(),
            interval_secs = interval.as_secs(),
            "🔥 Starting session warmup task"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_cycle(task_id, &signer, &executor, &hosts).await;
                        cycle_counter.fetch_add(1, Ordering::SeqCst);
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(task_id = %task_id, "Session warmup task stopped");
        });

        Self {
            task_id,
            shutdown_tx,
            handle,
            cycles,
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Completed warmup cycles
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Signal the loop to stop and wait for it to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(task_id = %self.task_id, error = %e, "Warmup task ended abnormally");
        }
    }
}

async fn run_cycle(task_id: Uuid, signer: &TokenSigner, executor: &CommandExecutor, hosts: &[String]) {
    let started = Instant::now();
    let no_args: [&str; 0] = [];
    let operation = Operation::executor_status().with_args(&no_args);

    let token = match signer.sign(&operation) {
        Ok(token) => token,
        Err(e) => {
            log_error(
                "warmup",
                "sign",
                &e.to_string(),
                Some(&format!("task_id={task_id}")),
            );
            return;
        }
    };
    let command = format!("{} {}", system::REMOTE_EXECUTE_VERB, token);

    let results = executor.run_batch(hosts, &command).await;
    let failed: Vec<&str> = hosts
        .iter()
        .zip(&results)
        .filter(|(_, result)| result.is_err())
        .map(|(host, _)| host.as_str())
        .collect();

    debug!(
        task_id = %task_id,
        hosts = hosts.len(),
        failed = failed.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Warmup cycle complete"
    );
    if !failed.is_empty() {
        warn!(task_id = %task_id, hosts = ?failed, "Warmup could not reach some hosts");
    }
}
