//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to the console and,
//! optionally, to a JSON log file, for following concurrent fan-out across a
//! fleet of hosts.

use chrono::Utc;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults
pub fn init_structured_logging() {
    init_logging_with_config(&LoggingConfig::default(), &get_environment());
}

/// Initialize structured logging from the `logging` configuration section.
///
/// Only the first call has any effect. If the embedding process already
/// installed a global subscriber it is left in place.
pub fn init_logging_with_config(config: &LoggingConfig, environment: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(environment));

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));

        let pid = process::id();
        let log_filename = format!(
            "{}.{}.{}.log",
            environment,
            pid,
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        let file_layer = if config.json_file {
            match prepare_log_directory(&config.directory) {
                Ok(()) => {
                    let file_appender =
                        tracing_appender::rolling::never(&config.directory, &log_filename);
                    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
                    let _ = FILE_GUARD.set(guard);
                    Some(
                        fmt::layer()
                            .with_writer(file_writer)
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_level(true)
                            .with_ansi(false)
                            .json()
                            .with_filter(EnvFilter::new(log_level.clone())),
                    )
                }
                Err(e) => {
                    eprintln!(
                        "signed-executor: log directory {} unavailable ({e}); logging to console only",
                        config.directory.display()
                    );
                    None
                }
            }
        } else {
            None
        };
        let log_file = if file_layer.is_some() {
            config.directory.join(&log_filename).display().to_string()
        } else {
            "-".to_string()
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            level = %log_level,
            log_file = %log_file,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn prepare_log_directory(directory: &Path) -> std::io::Result<()> {
    if !directory.exists() {
        fs::create_dir_all(directory)?;
    }
    Ok(())
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("SIGNED_EXECUTOR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a command about to be dispatched to a host
pub fn log_executor_request(host: &str, command: &str) {
    tracing::info!(
        host = %host,
        command = %command,
        timestamp = %Utc::now().to_rfc3339(),
        "📤 EXECUTOR_REQUEST"
    );
}

/// Log the classified response received from a host
pub fn log_executor_response(host: &str, status: &str, code: u16, message: &str, latency: Duration) {
    tracing::info!(
        host = %host,
        status = %status,
        code = code,
        message = %message,
        latency_ms = latency.as_millis() as u64,
        timestamp = %Utc::now().to_rfc3339(),
        "📥 EXECUTOR_RESPONSE"
    );
}

/// Log structured data for connection pool operations
pub fn log_pool_operation(
    operation: &str,
    host: Option<&str>,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        host = host,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔌 POOL_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
