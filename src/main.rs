//! Chat Relay Server - Entry Point
//!
//! Loads configuration, binds the listener, and serves until Ctrl-C.

use std::env;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::{ChatServer, RelayError, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<(), RelayError> {
    let mut config = ServerConfig::from_env()?;

    // Bind address from command line overrides the environment
    if let Some(addr) = env::args().nth(1) {
        config = config.with_bind_addr(addr.parse()?);
    }

    let server = ChatServer::new(config)?.bind()?;
    info!("Chat relay listening on {}", server.local_addr());

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    server.shutdown().await;

    Ok(())
}
