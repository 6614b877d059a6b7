//! huddle signaling server binary.
//!
//! # Usage
//!
//! ```bash
//! # Secret from the environment, user directory from a JSON file
//! HUDDLE_SECRET=change-me huddle-server --bind 0.0.0.0:9030 --users users.json
//!
//! # Secret on the command line (development only)
//! huddle-server --secret change-me --users users.json
//! ```
//!
//! The users file is a JSON array of directory records:
//! `[{"id": "u1", "email": "ada@example.com", "displayName": "Ada"}]`.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use huddle_auth::{InMemoryDirectory, User};
use huddle_server::{GatewayConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// WebRTC signaling server
#[derive(Parser, Debug)]
#[command(name = "huddle-server")]
#[command(about = "Token-authenticated WebRTC signaling server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:9030")]
    bind: String,

    /// Token signing secret (falls back to HUDDLE_SECRET)
    #[arg(long)]
    secret: Option<String>,

    /// Path to the user directory file (JSON array)
    #[arg(long)]
    users: Option<PathBuf>,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

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

    let Some(secret) = args.secret.or_else(|| std::env::var("HUDDLE_SECRET").ok()) else {
        return Err("no signing secret: pass --secret or set HUDDLE_SECRET".into());
    };

    let directory = match &args.users {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            let users: Vec<User> = serde_json::from_str(&text)
                .map_err(|e| format!("cannot parse {}: {e}", path.display()))?;
            tracing::info!("loaded {} users from {}", users.len(), path.display());
            InMemoryDirectory::from_users(users)
        },
        None => {
            tracing::warn!("no --users file: every connection will be rejected");
            InMemoryDirectory::new()
        },
    };

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        secret,
        gateway: GatewayConfig { max_connections: args.max_connections },
    };

    let server = Server::bind(config, Arc::new(directory)).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
