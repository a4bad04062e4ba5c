//! Connection and Peer definitions
//!
//! A `Connection` is one accepted TCP stream, owned by the session that
//! services it. Outbound bytes go through a bounded channel to a writer
//! task, the same way every other sender reaches the socket. A `Peer` is
//! the cloneable handle the registry keeps: it can queue bytes but does
//! not own the stream.

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SendError;
use crate::types::ConnectionId;

/// Registry-side handle to a live connection
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    addr: SocketAddr,
    outbound: mpsc::Sender<Bytes>,
}

impl Peer {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue a payload without waiting
    ///
    /// Fails if the writer has exited or the peer's queue is full.
    pub fn try_send(&self, payload: Bytes) -> Result<(), SendError> {
        self.outbound.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

/// One accepted stream plus its writer task
#[derive(Debug)]
pub struct Connection {
    peer: Peer,
    reader: OwnedReadHalf,
    writer: JoinHandle<()>,
    closing: CancellationToken,
}

impl Connection {
    /// Split the stream and start its writer task
    pub fn open(stream: TcpStream, addr: SocketAddr, outbound_queue: usize) -> Self {
        let id = ConnectionId::new();
        let (reader, writer) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::channel(outbound_queue.max(1));
        let closing = CancellationToken::new();

        let writer = tokio::spawn(write_loop(id, writer, outbound_rx, closing.clone()));

        Self {
            peer: Peer { id, addr, outbound },
            reader,
            writer,
            closing,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.peer.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.peer.addr
    }

    /// Handle for the registry
    pub fn peer(&self) -> Peer {
        self.peer.clone()
    }

    /// Queue a payload for this connection, waiting for queue space
    pub async fn send(&self, payload: Bytes) -> Result<(), SendError> {
        self.peer
            .outbound
            .send(payload)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Read one chunk. `Ok(0)` means the peer closed the stream.
    pub async fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf).await
    }

    /// Close the stream
    ///
    /// Consumes the connection, so it can only happen once. Stops the
    /// writer, shuts down the write half, and waits for the writer to exit.
    pub async fn close(self) {
        let Connection {
            peer,
            reader,
            writer,
            closing,
        } = self;

        closing.cancel();
        if let Err(e) = writer.await {
            debug!("Writer task for {} ended abnormally: {}", peer.id, e);
        }
        drop(reader);
        debug!("Connection {} ({}) closed", peer.id, peer.addr);
    }
}

/// Writer task (queued payloads -> socket)
async fn write_loop(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Bytes>,
    closing: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = closing.cancelled() => break,
            payload = outbound.recv() => {
                let Some(payload) = payload else {
                    break;
                };
                // A peer that stops reading can stall this write forever.
                tokio::select! {
                    biased;
                    _ = closing.cancelled() => break,
                    written = writer.write_all(&payload) => {
                        if let Err(e) = written {
                            debug!("Write to {} failed, ending writer task: {}", id, e);
                            break;
                        }
                    }
                }
            }
        }
    }

    let _ = writer.shutdown().await;
    debug!("Write task ended for {}", id);
}
