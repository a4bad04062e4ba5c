//! Per-connection session handler
//!
//! Drives one connection through prompt, registration, relay and
//! disconnect. Every exit path runs the same cleanup: close the
//! connection, leave the registry, tell everyone else.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::broadcast::broadcast;
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::RelayError;
use crate::message;
use crate::registry::Registry;
use crate::types::Username;

/// Session phase, only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Accepted, prompt not yet answered
    Connected,
    /// Username received, join notice going out
    Registering,
    /// Relaying messages
    Relaying,
    /// Terminal
    Disconnected,
}

/// Protocol state for one connection
#[derive(Debug, Clone)]
pub struct Session {
    username: Username,
    phase: Phase,
}

impl Session {
    pub fn new() -> Self {
        Self {
            username: Username::default(),
            phase: Phase::Connected,
        }
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `next`; moving backwards is ignored
    pub fn enter(&mut self, next: Phase) {
        if next > self.phase {
            self.phase = next;
        }
    }

    /// Record the username and move to `Registering`
    pub fn register(&mut self, username: Username) {
        self.username = username;
        self.enter(Phase::Registering);
    }

    pub fn is_registered(&self) -> bool {
        self.phase >= Phase::Registering && self.phase != Phase::Disconnected
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Sizes a session works with
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub username_capacity: usize,
    pub buffer_capacity: usize,
}

impl From<&ServerConfig> for SessionLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            username_capacity: config.username_capacity,
            buffer_capacity: config.buffer_capacity,
        }
    }
}

/// Run a session until its connection closes or `shutdown` fires
///
/// The connection must already be in `registry`. Cleanup runs on every
/// path; an I/O error is returned after cleanup for the caller to log.
pub async fn handle_session(
    mut conn: Connection,
    registry: Arc<Registry>,
    limits: SessionLimits,
    shutdown: CancellationToken,
) -> Result<Session, RelayError> {
    let id = conn.id();
    let mut session = Session::new();

    let outcome = tokio::select! {
        result = run(&mut conn, &mut session, &registry, limits) => result,
        _ = shutdown.cancelled() => {
            debug!("Session {} interrupted by shutdown", id);
            Ok(())
        }
    };

    session.enter(Phase::Disconnected);

    conn.close().await;
    if !registry.remove(id) {
        debug!("Connection {} was not registered at disconnect", id);
    }

    info!("Client `{}` disconnected", session.username());
    broadcast(&registry, id, &message::left(session.username()));

    outcome.map(|()| session)
}

/// Prompt, register, relay. Returns when the peer closes.
async fn run(
    conn: &mut Connection,
    session: &mut Session,
    registry: &Registry,
    limits: SessionLimits,
) -> Result<(), RelayError> {
    conn.send(Bytes::from_static(message::PROMPT)).await?;

    let mut name_buf = vec![0u8; limits.username_capacity];
    let received = conn.receive(&mut name_buf).await?;
    if received == 0 {
        debug!("Connection {} closed before registering", conn.id());
        return Ok(());
    }

    session.register(Username::from_received(
        &name_buf[..received],
        limits.username_capacity,
    ));
    info!(
        "Client {} login with username `{}`",
        conn.addr(),
        session.username()
    );
    broadcast(registry, conn.id(), &message::joined(session.username()));
    session.enter(Phase::Relaying);

    // Message bodies are read straight in after the prefix.
    let mut buf = message::chat_prefix(session.username(), limits.buffer_capacity);
    let prefix_len = buf.len();
    buf.resize(limits.buffer_capacity.max(prefix_len + 1), 0);

    loop {
        let received = conn.receive(&mut buf[prefix_len..]).await?;
        if received == 0 {
            return Ok(());
        }

        debug!(
            "{}: {}",
            session.username(),
            String::from_utf8_lossy(&buf[prefix_len..prefix_len + received])
        );
        let payload = Bytes::copy_from_slice(&buf[..prefix_len + received]);
        broadcast(registry, conn.id(), &payload);
    }
}
