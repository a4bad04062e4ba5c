//! Multi-client TCP Chat Relay Library
//!
//! A minimal chat relay built on tokio: clients connect, register a
//! username, and every message they send is fanned out to all other
//! connected clients.
//!
//! # Features
//! - Fixed-capacity connection registry
//! - Username registration prompt
//! - Join / leave notices
//! - Message broadcast to everyone but the sender
//! - Graceful shutdown that waits for every session's cleanup
//! - Interactive line-based client
//!
//! # Architecture
//! - `ChatServer` accepts connections and admits them into a shared `Registry`
//! - Each admitted connection gets its own session task
//! - Sessions broadcast through the registry under a single lock; bytes
//!   reach each socket through that connection's writer task
//!
//! # Example
//! ```ignore
//! use chat_relay::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::RelayError> {
//!     let server = ChatServer::new(ServerConfig::default())?.bind()?;
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcast::broadcast;
pub use client::run_client;
pub use config::ServerConfig;
pub use connection::{Connection, Peer};
pub use error::{RelayError, SendError};
pub use registry::Registry;
pub use server::{ChatServer, ServerHandle};
pub use session::{handle_session, Phase, Session, SessionLimits};
pub use types::{ConnectionId, Username};
