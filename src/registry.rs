//! Connection registry
//!
//! A fixed number of slots, each empty or holding one `Peer`. Every
//! operation takes the same lock and is O(capacity). The lock is never
//! held across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::connection::Peer;
use crate::types::ConnectionId;

/// Bounded pool of live connections
#[derive(Debug)]
pub struct Registry {
    slots: Mutex<Vec<Option<Peer>>>,
}

impl Registry {
    /// Create a registry with `capacity` empty slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; capacity]),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<Peer>>> {
        // Slots are plain data, still consistent after a panicking holder.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.lock().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().iter().flatten().any(|peer| peer.id() == id)
    }

    /// Store `peer` in the first empty slot
    ///
    /// Returns false without storing if every slot is taken or the
    /// connection is already registered.
    pub fn add(&self, peer: Peer) -> bool {
        let mut slots = self.lock();

        if slots.iter().flatten().any(|p| p.id() == peer.id()) {
            debug!("Connection {} already registered", peer.id());
            return false;
        }

        match slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(peer);
                true
            }
            None => false,
        }
    }

    /// Clear the slot holding `id`
    ///
    /// Returns false if no slot holds it, so a second remove is a no-op.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut slots = self.lock();
        match slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|p| p.id() == id))
        {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// Call `f` for every registered peer except `excluded`
    ///
    /// Runs under the lock: membership cannot change mid-iteration.
    pub fn for_each_except<F>(&self, excluded: ConnectionId, mut f: F)
    where
        F: FnMut(&Peer),
    {
        let slots = self.lock();
        for peer in slots.iter().flatten() {
            if peer.id() != excluded {
                f(peer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use tokio::net::{TcpListener, TcpStream};

    /// Open `n` loopback connections, keeping the remote ends alive
    async fn connections(n: usize) -> (Vec<Connection>, Vec<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut conns = Vec::new();
        let mut remotes = Vec::new();
        for _ in 0..n {
            remotes.push(TcpStream::connect(addr).await.unwrap());
            let (stream, peer_addr) = listener.accept().await.unwrap();
            conns.push(Connection::open(stream, peer_addr, 8));
        }
        (conns, remotes)
    }

    #[tokio::test]
    async fn test_registry_creation() {
        let registry = Registry::new(4);
        assert_eq!(registry.capacity(), 4);
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_registry_add_until_full() {
        let (conns, _remotes) = connections(3).await;
        let registry = Registry::new(2);

        assert!(registry.add(conns[0].peer()));
        assert!(registry.add(conns[1].peer()));
        assert_eq!(registry.len(), 2);

        // Cannot add past capacity
        assert!(!registry.add(conns[2].peer()));
        assert!(!registry.contains(conns[2].id()));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_registry_rejects_duplicate() {
        let (conns, _remotes) = connections(1).await;
        let registry = Registry::new(4);

        assert!(registry.add(conns[0].peer()));
        assert!(!registry.add(conns[0].peer()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_remove_is_idempotent() {
        let (conns, _remotes) = connections(1).await;
        let registry = Registry::new(4);
        registry.add(conns[0].peer());

        assert!(registry.remove(conns[0].id()));
        assert!(!registry.remove(conns[0].id()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_registry_reuses_freed_slot() {
        let (conns, _remotes) = connections(3).await;
        let registry = Registry::new(2);
        registry.add(conns[0].peer());
        registry.add(conns[1].peer());

        registry.remove(conns[0].id());
        assert!(registry.add(conns[2].peer()));
        assert!(registry.contains(conns[2].id()));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_registry_for_each_except() {
        let (conns, _remotes) = connections(3).await;
        let registry = Registry::new(4);
        for conn in &conns {
            registry.add(conn.peer());
        }

        let mut seen = Vec::new();
        registry.for_each_except(conns[1].id(), |peer| seen.push(peer.id()));

        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&conns[0].id()));
        assert!(seen.contains(&conns[2].id()));
        assert!(!seen.contains(&conns[1].id()));
    }

    #[tokio::test]
    async fn test_registry_concurrent_adds_respect_capacity() {
        let (conns, _remotes) = connections(8).await;
        let registry = std::sync::Arc::new(Registry::new(5));

        let handles: Vec<_> = conns
            .iter()
            .map(|conn| {
                let registry = registry.clone();
                let peer = conn.peer();
                std::thread::spawn(move || registry.add(peer))
            })
            .collect();

        let added = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|added| *added)
            .count();

        assert_eq!(added, 5);
        assert_eq!(registry.len(), 5);
    }
}
