//! Errors raised while locating, reading and validating executor
//! configuration.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No signed-executor configuration found; looked for {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("Cannot read configuration {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("Configuration {} is malformed: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    /// A `RetryConfig` section that cannot produce a usable schedule
    #[error("Retry policy '{section}' is unusable: {reason}")]
    RetryPolicy {
        section: &'static str,
        reason: String,
    },

    /// An entry of the `hosts` map that cannot be resolved
    #[error("Host '{host}' is misconfigured: {reason}")]
    Host { host: String, reason: &'static str },

    #[error("Setting {setting} = {value} rejected: {reason}")]
    Setting {
        setting: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ConfigurationError {
    pub(crate) fn unreadable(path: &Path, error: impl std::fmt::Display) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }

    pub(crate) fn malformed(path: &Path, error: impl std::fmt::Display) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }

    pub(crate) fn retry_policy(section: &'static str, reason: impl Into<String>) -> Self {
        Self::RetryPolicy {
            section,
            reason: reason.into(),
        }
    }

    pub(crate) fn setting(setting: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::Setting {
            setting,
            value: value.to_string(),
            reason,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
