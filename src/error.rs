//! Error types for the chat relay
//!
//! Defines relay-level errors and per-peer send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Relay-level errors
///
/// Startup errors are fatal to the process; errors returned from a
/// session only end that session.
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO error (socket create/bind/listen, or a session's receive)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid socket address in configuration
    #[error("Invalid address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Could not queue bytes on a connection's own outbound channel
    #[error("Send error: {0}")]
    Send(#[from] SendError),
}

/// Outbound send errors
///
/// Occurs when a payload cannot be queued for a peer's writer task.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The writer task has exited (connection closed)
    #[error("Channel closed")]
    ChannelClosed,

    /// The peer is not draining its outbound queue
    #[error("Outbound queue full")]
    Full,
}
