//! Chat Relay Client - Entry Point
//!
//! Connects to a relay and chats over stdin/stdout.

use std::env;
use std::process::ExitCode;

use tokio::io::{stdin, stdout, BufReader};
use tokio::net::TcpStream;
use tracing::error;
use tracing_subscriber::EnvFilter;

use chat_relay::run_client;

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:6969";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Could not connect to server {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    match run_client(stream, BufReader::new(stdin()), stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Client failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
