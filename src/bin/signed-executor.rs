//! # Signed Executor CLI
//!
//! Operator tool for the signed executor: print the verifier public key, sign
//! commands, run operations on one host or a set of hosts, pre-warm sessions
//! and validate configuration files.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use signed_executor::client::ExecutorClient;
use signed_executor::config::ConfigManager;
use signed_executor::logging::init_logging_with_config;
use signed_executor::operations::Operation;
use signed_executor::signing::TokenSigner;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "signed-executor")]
#[command(about = "Run signed operations on remote hosts over SSH")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment section to apply (development, test, production)
    #[arg(short, long)]
    environment: Option<String>,

    /// Directory containing signed-executor.yaml (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the base64 SPKI public key remote verifiers need
    PublicKey,

    /// Sign an operation and print the wire token
    Sign {
        /// Operation name, e.g. NS.GET_ZONE_MASTER
        operation: String,
        args: Vec<String>,
    },

    /// Run an operation on one host
    Exec {
        host: String,
        operation: String,
        args: Vec<String>,
    },

    /// Run an operation on several hosts
    Batch {
        operation: String,
        args: Vec<String>,

        /// Comma-separated host names; defaults to every configured host
        #[arg(long, value_delimiter = ',')]
        hosts: Vec<String>,
    },

    /// Open sessions to every configured host and report failures
    Warmup {
        /// Keep sessions warm on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Load and validate the configuration, then print it with secrets masked
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &environment)
        .context("failed to load configuration")?;
    let config = manager.config();

    init_logging_with_config(&config.logging, manager.environment());

    match cli.command {
        Commands::PublicKey => {
            let signer = TokenSigner::from_config(&config.signing)?;
            println!("{}", signer.public_key_base64()?);
        }
        Commands::Sign { operation, args } => {
            let operation = parse_operation(&operation)?;
            let signer = TokenSigner::from_config(&config.signing)?;
            println!("{}", signer.sign(&operation.with_args(&args))?);
        }
        Commands::Exec {
            host,
            operation,
            args,
        } => {
            let operation = parse_operation(&operation)?;
            let client = ExecutorClient::bootstrap(config)?;
            let response = client.execute_on_server(&host, &operation, &args).await;
            client.shutdown().await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Batch {
            operation,
            args,
            hosts,
        } => {
            let operation = parse_operation(&operation)?;
            let hosts = if hosts.is_empty() { config.fleet() } else { hosts };
            let client = ExecutorClient::bootstrap(config)?;
            let responses = client.execute_on_servers(&hosts, &operation, &args).await;
            client.shutdown().await;
            println!("{}", serde_json::to_string_pretty(&responses)?);
        }
        Commands::Warmup { watch } => {
            let client = ExecutorClient::bootstrap(config)?;
            let report = client.warm_up(&config.fleet()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if watch {
                let interval = Duration::from_secs(config.pool.warmup_interval_seconds);
                client.start_warmup(config.fleet(), interval).await;
                tokio::signal::ctrl_c()
                    .await
                    .context("failed to listen for ctrl-c")?;
            }
            client.shutdown().await;

            if !report.all_ready() {
                return Err(anyhow!("{} hosts could not be reached", report.failed.len()));
            }
        }
        Commands::ValidateConfig => {
            println!("✅ Configuration valid: {}", manager.config_file().display());
            println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
        }
    }

    Ok(())
}

fn parse_operation(name: &str) -> Result<Operation> {
    Operation::parse(name).ok_or_else(|| anyhow!("operation must look like NAMESPACE.VERB, got '{name}'"))
}
