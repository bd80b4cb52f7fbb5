//! OpenSSH ControlMaster transport.
//!
//! Each pooled session is a background `ssh -M` master process listening on a
//! per-host control socket. Commands are sent as multiplexed clients over that
//! socket, so only the first call to a host pays for the TCP and key exchange
//! handshake.

use async_trait::async_trait;
use std::ffi::OsString;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CommandOutput, RemoteSession, SessionConnector, TransportError, TransportPhase};
use crate::config::SshConfig;

/// Exit status the OpenSSH client reserves for its own failures
const SSH_CLIENT_FAILURE: i32 = 255;

const PERMISSION_DENIED_MARKERS: &[&str] = &["permission denied", "authentication failed"];

const CONNECTION_LOST_MARKERS: &[&str] = &[
    "connection refused",
    "connection closed",
    "connection reset",
    "connection lost",
    "broken pipe",
    "control socket connect",
    "mux_client",
    "no route to host",
    "could not resolve",
];

/// Map OpenSSH client stderr to a transport error, if it describes one.
///
/// `connect_timeout` is the `ConnectTimeout` the client was given; an ssh
/// "timed out" report is a connect-phase timeout after that long.
///
/// Returns `None` for stderr that does not look like a session-level failure;
/// such output is handed back to callers as ordinary command output.
pub(crate) fn classify_ssh_failure(
    host: &str,
    stderr: &str,
    connect_timeout: Duration,
) -> Option<TransportError> {
    let lowered = stderr.to_lowercase();
    let message = stderr.trim().to_string();

    if PERMISSION_DENIED_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return Some(TransportError::permission_denied(host, message));
    }
    if lowered.contains("timed out") {
        return Some(TransportError::timeout(host, TransportPhase::Connect, connect_timeout));
    }
    if CONNECTION_LOST_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return Some(TransportError::connection_lost(host, message));
    }
    None
}

/// Opens ControlMaster sessions with the system `ssh` binary
#[derive(Debug, Clone)]
pub struct OpenSshConnector {
    config: SshConfig,
}

impl OpenSshConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    fn control_path(&self, host: &str) -> PathBuf {
        let file_name: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.config.control_dir.join(format!("{file_name}.sock"))
    }

    fn log_path(&self, host: &str) -> PathBuf {
        self.control_path(host).with_extension("log")
    }
}

#[async_trait]
impl SessionConnector for OpenSshConnector {
    async fn connect(
        &self,
        host: &str,
        address: IpAddr,
        timeout: Duration,
    ) -> Result<Arc<dyn RemoteSession>, TransportError> {
        tokio::fs::create_dir_all(&self.config.control_dir)
            .await
            .map_err(|e| TransportError::io(host, e))?;

        let connect_timeout_secs = timeout.as_secs().max(1);
        let session = OpenSshSession {
            host: host.to_string(),
            address,
            control_path: self.control_path(host),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            config: self.config.clone(),
        };

        // A master left over from an earlier session may still be serving the socket
        if session.control_path.exists() {
            if session.is_alive().await {
                debug!(host = %host, "♻️ Adopting existing SSH control master");
                return Ok(Arc::new(session));
            }
            let _ = tokio::fs::remove_file(&session.control_path).await;
        }

        let log_path = self.log_path(host);
        let _ = tokio::fs::remove_file(&log_path).await;

        let mut command = Command::new(&self.config.binary);
        command
            .arg("-M")
            .arg("-N")
            .arg("-f")
            .arg("-E")
            .arg(&log_path)
            .arg("-o")
            .arg("ControlPersist=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={connect_timeout_secs}"))
            .args(session.base_args())
            .arg(address.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = command
            .status()
            .await
            .map_err(|e| TransportError::io(host, e))?;

        if status.success() {
            debug!(host = %host, address = %address, "🔌 SSH control master established");
            return Ok(Arc::new(session));
        }

        let client_log = tokio::fs::read_to_string(&log_path)
            .await
            .unwrap_or_default();
        Err(classify_ssh_failure(host, &client_log, session.connect_timeout).unwrap_or_else(|| {
            TransportError::connection_lost(
                host,
                format!(
                    "ssh exited with {}: {}",
                    status.code().unwrap_or(SSH_CLIENT_FAILURE),
                    client_log.trim()
                ),
            )
        }))
    }
}

/// Session backed by a running ControlMaster process
#[derive(Debug, Clone)]
pub struct OpenSshSession {
    host: String,
    address: IpAddr,
    control_path: PathBuf,
    connect_timeout: Duration,
    config: SshConfig,
}

impl OpenSshSession {
    pub fn control_path(&self) -> &Path {
        &self.control_path
    }

    fn base_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-S".into(),
            self.control_path.clone().into(),
            "-p".into(),
            self.config.port.to_string().into(),
            "-l".into(),
            self.config.user.clone().into(),
            "-o".into(),
            "BatchMode=yes".into(),
        ];
        if let Some(identity) = &self.config.identity_file {
            args.push("-i".into());
            args.push(identity.clone().into());
        }
        if !self.config.strict_host_key_checking {
            args.extend([
                OsString::from("-o"),
                OsString::from("StrictHostKeyChecking=no"),
                OsString::from("-o"),
                OsString::from("UserKnownHostsFile=/dev/null"),
            ]);
        }
        for option in &self.config.extra_options {
            args.push("-o".into());
            args.push(option.into());
        }
        args
    }

    fn control_command(&self, operation: &str) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .arg("-O")
            .arg(operation)
            .args(self.base_args())
            .arg(self.address.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    fn host(&self) -> &str {
        &self.host
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError> {
        let output = Command::new(&self.config.binary)
            .args(self.base_args())
            .arg(self.address.to_string())
            .arg("--")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TransportError::io(&self.host, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_status = output.status.code();

        if exit_status == Some(SSH_CLIENT_FAILURE) {
            if let Some(error) = classify_ssh_failure(&self.host, &stderr, self.connect_timeout) {
                return Err(error);
            }
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        })
    }

    async fn is_alive(&self) -> bool {
        let probe = self.control_command("check").status();
        match tokio::time::timeout(Duration::from_millis(self.config.liveness_timeout_ms), probe).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                warn!(host = %self.host, error = %e, "SSH liveness probe could not run");
                false
            }
            Err(_) => {
                warn!(
                    host = %self.host,
                    timeout_ms = self.config.liveness_timeout_ms,
                    "SSH liveness probe timed out"
                );
                false
            }
        }
    }

    async fn close(&self) {
        if let Err(e) = self.control_command("exit").status().await {
            warn!(host = %self.host, error = %e, "Failed to stop SSH control master");
        }
        let _ = tokio::fs::remove_file(&self.control_path).await;
        debug!(host = %self.host, "🔒 SSH control master closed");
    }
}
