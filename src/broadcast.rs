//! Broadcast engine
//!
//! Fans one payload out to every registered peer except the sender.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::SendError;
use crate::registry::Registry;
use crate::types::ConnectionId;

/// Queue `payload` for every registered peer except `from`
///
/// Never waits on a recipient. If a peer's outbound queue is full, even
/// briefly, this payload is lost for that peer; a closed peer is skipped
/// the same way. Both are logged. Returns how many peers accepted the
/// payload.
///
/// Payloads are queued while the registry lock is held, so two
/// broadcasts reach any one recipient in the order they were issued.
pub fn broadcast(registry: &Registry, from: ConnectionId, payload: &Bytes) -> usize {
    let mut delivered = 0;

    registry.for_each_except(from, |peer| match peer.try_send(payload.clone()) {
        Ok(()) => delivered += 1,
        Err(SendError::Full) => warn!(
            "Outbound queue full, message lost for {} ({})",
            peer.id(),
            peer.addr()
        ),
        Err(e) => debug!("Dropping broadcast to {} ({}): {}", peer.id(), peer.addr(), e),
    });

    delivered
}
