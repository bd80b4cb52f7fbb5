//! # Executor Configuration
//!
//! YAML-based configuration for the signed executor core. A single file holds
//! the base settings plus optional per-environment override sections
//! (`development`, `test`, `production`) that are merged over the base by
//! [`ConfigManager`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use signed_executor::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//! let cap = config.batch.max_concurrency;
//! let connect_policy = config.pool.connect_retry.policy();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::system;
use crate::resilience::RetryPolicy;

/// Root configuration structure mirroring signed-executor.yaml
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Detected deployment environment, filled in by the loader
    pub environment: String,

    /// Token signing settings
    pub signing: SigningConfig,

    /// SSH client settings
    pub ssh: SshConfig,

    /// Connection pool settings
    pub pool: PoolConfig,

    /// Batch fan-out settings
    pub batch: BatchConfig,

    /// Logical host name to addresses
    pub hosts: HashMap<String, Vec<IpAddr>>,

    /// Logging output settings
    pub logging: LoggingConfig,
}

/// Token signing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    pub token_ttl_seconds: i64,
    /// Directory holding a persisted key pair. When unset a fresh key is
    /// generated for every process.
    pub key_directory: Option<PathBuf>,
}

/// SSH client configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SshConfig {
    pub binary: PathBuf,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    /// Directory for ControlMaster sockets and client logs
    pub control_dir: PathBuf,
    pub strict_host_key_checking: bool,
    /// Additional `-o` options passed verbatim
    pub extra_options: Vec<String>,
    /// Upper bound on one command run over a live session
    pub execution_timeout_ms: u64,
    pub liveness_timeout_ms: u64,
}

/// Adaptive timeout retry settings.
///
/// A section may set only some fields; the rest come from the defaults of
/// the policy it configures (connect or batch).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    pub base_timeout_ms: u64,
    pub multiplier: f64,
    pub max_timeout_ms: u64,
    pub max_attempts: u32,
}

/// Partial retry section as written in YAML
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetryOverrides {
    base_timeout_ms: Option<u64>,
    multiplier: Option<f64>,
    max_timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
}

impl RetryOverrides {
    fn over(self, base: RetryConfig) -> RetryConfig {
        RetryConfig {
            base_timeout_ms: self.base_timeout_ms.unwrap_or(base.base_timeout_ms),
            multiplier: self.multiplier.unwrap_or(base.multiplier),
            max_timeout_ms: self.max_timeout_ms.unwrap_or(base.max_timeout_ms),
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
        }
    }
}

fn connect_retry<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RetryConfig, D::Error> {
    RetryOverrides::deserialize(deserializer).map(|o| o.over(RetryConfig::connect()))
}

fn batch_retry<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RetryConfig, D::Error> {
    RetryOverrides::deserialize(deserializer).map(|o| o.over(RetryConfig::batch()))
}

impl RetryConfig {
    /// Session establishment: 3s doubling to 12s, three attempts
    pub fn connect() -> Self {
        Self {
            base_timeout_ms: 3_000,
            multiplier: 2.0,
            max_timeout_ms: 12_000,
            max_attempts: 3,
        }
    }

    /// Per-host batch attempt: 5s doubling to 20s, two attempts
    pub fn batch() -> Self {
        Self {
            base_timeout_ms: 5_000,
            multiplier: 2.0,
            max_timeout_ms: 20_000,
            max_attempts: 2,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.base_timeout_ms),
            self.multiplier,
            Duration::from_millis(self.max_timeout_ms),
            self.max_attempts,
        )
    }

    fn validate(&self, section: &'static str) -> ConfigResult<()> {
        if self.base_timeout_ms == 0 {
            return Err(ConfigurationError::retry_policy(section, "base_timeout_ms is 0"));
        }
        if self.max_timeout_ms < self.base_timeout_ms {
            return Err(ConfigurationError::retry_policy(
                section,
                format!(
                    "max_timeout_ms {} is below base_timeout_ms {}",
                    self.max_timeout_ms, self.base_timeout_ms
                ),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigurationError::retry_policy(
                section,
                format!("multiplier {} must be finite and at least 1.0", self.multiplier),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigurationError::retry_policy(section, "max_attempts is 0"));
        }
        Ok(())
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    #[serde(deserialize_with = "connect_retry")]
    pub connect_retry: RetryConfig,
    /// Simultaneous session creations during warmup
    pub warmup_concurrency: usize,
    /// Interval of the periodic warmup task, in seconds; must be positive
    pub warmup_interval_seconds: u64,
}

/// Batch fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_concurrency: usize,
    #[serde(deserialize_with = "batch_retry")]
    pub retry: RetryConfig,
    pub profiling_enabled: bool,
    /// Hosts slower than mean + factor * stdev are reported as outliers
    pub slow_host_stddev_factor: f64,
}

/// Logging output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter directive; falls back to the environment default
    pub level: Option<String>,
    pub directory: PathBuf,
    pub json_file: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            signing: SigningConfig::default(),
            ssh: SshConfig::default(),
            pool: PoolConfig::default(),
            batch: BatchConfig::default(),
            hosts: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            token_ttl_seconds: system::TOKEN_TTL_SECONDS,
            key_directory: None,
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ssh"),
            user: "root".to_string(),
            port: 22,
            identity_file: None,
            control_dir: std::env::temp_dir().join("signed-executor"),
            strict_host_key_checking: false,
            extra_options: Vec::new(),
            execution_timeout_ms: system::DEFAULT_EXECUTION_TIMEOUT_MS,
            liveness_timeout_ms: 2_000,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_retry: RetryConfig::connect(),
            warmup_concurrency: system::DEFAULT_WARMUP_CONCURRENCY,
            warmup_interval_seconds: system::DEFAULT_WARMUP_INTERVAL_SECONDS,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: system::DEFAULT_BATCH_CONCURRENCY,
            retry: RetryConfig::batch(),
            profiling_enabled: false,
            slow_host_stddev_factor: 2.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            directory: PathBuf::from("log"),
            json_file: true,
        }
    }
}

impl SshConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }
}

impl ExecutorConfig {
    /// Validate cross-field constraints after loading
    pub fn validate(&self) -> ConfigResult<()> {
        if self.signing.token_ttl_seconds <= 0 {
            return Err(ConfigurationError::setting(
                "signing.token_ttl_seconds",
                self.signing.token_ttl_seconds,
                "tokens need a positive lifetime",
            ));
        }
        if self.ssh.user.is_empty() {
            return Err(ConfigurationError::setting("ssh.user", "\"\"", "a login user is required"));
        }
        if self.ssh.execution_timeout_ms == 0 {
            return Err(ConfigurationError::setting(
                "ssh.execution_timeout_ms",
                0,
                "commands need a positive time bound",
            ));
        }

        self.pool.connect_retry.validate("pool.connect_retry")?;
        self.batch.retry.validate("batch.retry")?;

        if self.pool.warmup_concurrency == 0 {
            return Err(ConfigurationError::setting(
                "pool.warmup_concurrency",
                0,
                "warmup must open at least one session at a time",
            ));
        }
        if self.pool.warmup_interval_seconds == 0 {
            return Err(ConfigurationError::setting(
                "pool.warmup_interval_seconds",
                0,
                "the warmup loop needs a positive interval",
            ));
        }
        if self.batch.max_concurrency == 0 {
            return Err(ConfigurationError::setting(
                "batch.max_concurrency",
                0,
                "batches must run at least one host at a time",
            ));
        }

        for (host, addresses) in &self.hosts {
            if host.trim().is_empty() {
                return Err(ConfigurationError::Host {
                    host: host.clone(),
                    reason: "host names must not be blank",
                });
            }
            if addresses.is_empty() {
                return Err(ConfigurationError::Host {
                    host: host.clone(),
                    reason: "no addresses listed",
                });
            }
        }

        Ok(())
    }

    /// Fleet host names in a stable order
    pub fn fleet(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.hosts.keys().cloned().collect();
        hosts.sort();
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExecutorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.signing.token_ttl_seconds, 900);
        assert_eq!(config.pool.warmup_concurrency, 100);
    }

    #[test]
    fn test_retry_config_converts_to_policy() {
        let policy = ExecutorConfig::default().pool.connect_retry.policy();
        assert_eq!(policy.base_timeout, Duration::from_secs(3));
        assert_eq!(policy.max_timeout, Duration::from_secs(12));
        assert_eq!(policy.max_attempts, 3);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ExecutorConfig::default();
        config.signing.token_ttl_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Setting {
                setting: "signing.token_ttl_seconds",
                ..
            })
        ));

        let mut config = ExecutorConfig::default();
        config.batch.retry.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::RetryPolicy {
                section: "batch.retry",
                ..
            })
        ));

        let mut config = ExecutorConfig::default();
        config.pool.connect_retry.max_timeout_ms = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::RetryPolicy {
                section: "pool.connect_retry",
                ..
            })
        ));

        let mut config = ExecutorConfig::default();
        config.pool.warmup_interval_seconds = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Setting {
                setting: "pool.warmup_interval_seconds",
                ..
            })
        ));

        let mut config = ExecutorConfig::default();
        config.hosts.insert("empty".to_string(), Vec::new());
        match config.validate() {
            Err(ConfigurationError::Host { host, .. }) => assert_eq!(host, "empty"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_partial_retry_sections_keep_their_own_defaults() {
        let config: ExecutorConfig = serde_yaml::from_str(
            r#"
pool:
  connect_retry:
    max_attempts: 5
batch:
  retry:
    base_timeout_ms: 1000
"#,
        )
        .unwrap();

        assert_eq!(
            config.pool.connect_retry,
            RetryConfig {
                max_attempts: 5,
                ..RetryConfig::connect()
            }
        );
        assert_eq!(
            config.batch.retry,
            RetryConfig {
                base_timeout_ms: 1000,
                ..RetryConfig::batch()
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_retry_field_is_rejected() {
        let parsed = serde_yaml::from_str::<ExecutorConfig>("pool:\n  connect_retry:\n    attempts: 5\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_fleet_is_sorted() {
        let mut config = ExecutorConfig::default();
        config
            .hosts
            .insert("ns2".to_string(), vec!["192.0.2.2".parse().unwrap()]);
        config
            .hosts
            .insert("ns1".to_string(), vec!["192.0.2.1".parse().unwrap()]);
        assert_eq!(config.fleet(), vec!["ns1".to_string(), "ns2".to_string()]);
    }
}
