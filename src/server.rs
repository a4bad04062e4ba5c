//! ChatServer acceptor loop
//!
//! Binds the listening socket, admits accepted connections into the
//! registry, and supervises one session task per admitted connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::RelayError;
use crate::registry::Registry;
use crate::session::{handle_session, SessionLimits};

/// The chat relay server
///
/// Owns the configuration and the registry shared with every session.
pub struct ChatServer {
    config: ServerConfig,
    registry: Arc<Registry>,
}

impl ChatServer {
    /// Create a server with an empty registry sized from `config`
    pub fn new(config: ServerConfig) -> Result<Self, RelayError> {
        config.validate()?;
        let registry = Arc::new(Registry::new(config.pool_capacity));
        Ok(Self { config, registry })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Create, bind and listen on the configured address
    pub fn listen(&self) -> Result<TcpListener, RelayError> {
        let addr = self.config.bind_addr;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        info!("Created socket");

        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        info!("Bound socket to {}", addr);

        let listener = socket.listen(self.config.backlog)?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Bind and start the acceptor loop on a background task
    pub fn bind(self) -> Result<ServerHandle, RelayError> {
        let listener = self.listen()?;
        let local_addr = listener.local_addr()?;
        let registry = self.registry();
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(self.run(listener, shutdown.clone()));

        Ok(ServerHandle {
            local_addr,
            registry,
            shutdown,
            task,
        })
    }

    /// Run the acceptor loop until `shutdown` fires
    ///
    /// Accept errors are logged and skipped. On shutdown, waits for every
    /// session to finish its cleanup before returning.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) {
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!("Session task failed: {}", e);
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr, &mut sessions, &shutdown).await,
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            }
        }

        info!("Shutting down, waiting for {} sessions", sessions.len());
        drop(listener);
        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                error!("Session task failed: {}", e);
            }
        }
        info!("ChatServer stopped");
    }

    /// Register a fresh connection and spawn its session, or reject it
    async fn admit(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        sessions: &mut JoinSet<()>,
        shutdown: &CancellationToken,
    ) {
        let conn = Connection::open(stream, addr, self.config.outbound_queue);

        if !self.registry.add(conn.peer()) {
            warn!(
                "Connection pool is full ({}), rejecting {}",
                self.registry.capacity(),
                addr
            );
            conn.close().await;
            return;
        }

        info!("New client connected from {}", addr);
        debug!(
            "Registered clients: {}/{}",
            self.registry.len(),
            self.registry.capacity()
        );

        let registry = self.registry.clone();
        let limits = SessionLimits::from(&self.config);
        let shutdown = shutdown.clone();
        sessions.spawn(async move {
            if let Err(e) = handle_session(conn, registry, limits, shutdown).await {
                error!("Session for {} ended with error: {}", addr, e);
            }
        });
    }
}

/// Handle to a running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Stop accepting, end every session, and wait for their cleanup
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!("Acceptor task failed: {}", e);
        }
    }
}
