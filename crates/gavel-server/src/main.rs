//! Gavel server binary.
//!
//! # Usage
//!
//! ```bash
//! # Three replicas, keys kept in memory
//! gavel-server --bind 127.0.0.1:1099
//!
//! # Five replicas, per-user key files for clients to read
//! gavel-server --replicas 5 --key-dir ./keys
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use gavel_server::{ClusterConfig, Server, ServerConfig, default_seed_users};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Gavel auction server
#[derive(Parser, Debug)]
#[command(name = "gavel-server")]
#[command(about = "Replicated auction service")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:1099")]
    bind: String,

    /// Number of replicas
    #[arg(short, long, default_value = "3")]
    replicas: usize,

    /// Broadcast timeout in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    /// Directory for per-user key files (in memory if omitted)
    #[arg(short, long)]
    key_dir: Option<PathBuf>,

    /// Start without the default users
    #[arg(long)]
    no_seed: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Gavel server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.key_dir.is_none() {
        tracing::warn!("No key directory given - secrets are kept in memory only");
    }

    let config = ServerConfig {
        bind_address: args.bind,
        cluster: ClusterConfig {
            replicas: args.replicas,
            broadcast_timeout: Duration::from_millis(args.timeout_ms),
            seed_users: if args.no_seed { Vec::new() } else { default_seed_users() },
        },
        key_dir: args.key_dir,
    };

    let server = Server::bind(config).await?;
    server.run().await?;

    Ok(())
}
