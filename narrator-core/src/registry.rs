// Connection registry
// Tracks attached peer connections, optionally bounded

use crate::error::{PipelineError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

pub type ConnectionId = String;

/// Registry of live connections.
///
/// `capacity` of `Some(n)` rejects attach attempts once `n` connections are
/// registered; existing connections are left untouched. `None` is unbounded.
pub struct ConnectionRegistry<C> {
    name: &'static str,
    capacity: Option<usize>,
    connections: RwLock<HashMap<ConnectionId, C>>,
    /// Registration order, used for deterministic snapshots
    order: RwLock<Vec<ConnectionId>>,
}

impl<C: Clone> ConnectionRegistry<C> {
    pub fn bounded(name: &'static str, capacity: usize) -> Self {
        Self::new(name, Some(capacity))
    }

    pub fn unbounded(name: &'static str) -> Self {
        Self::new(name, None)
    }

    fn new(name: &'static str, capacity: Option<usize>) -> Self {
        Self {
            name,
            capacity,
            connections: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register a connection, returning its id
    pub fn register(&self, handle: C) -> Result<ConnectionId> {
        let connection_id = Uuid::new_v4().to_string();

        {
            // Check and insert under one write lock so two attaches cannot both pass
            let mut connections = self.connections.write();
            if let Some(capacity) = self.capacity {
                if connections.len() >= capacity {
                    return Err(PipelineError::PeerRejected);
                }
            }
            connections.insert(connection_id.clone(), handle);
            self.order.write().push(connection_id.clone());
        }

        info!("{} connection registered: {}", self.name, connection_id);
        Ok(connection_id)
    }

    /// Remove a connection. Returns its handle if it was still registered.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<C> {
        let removed = {
            let mut connections = self.connections.write();
            let removed = connections.remove(connection_id);
            if removed.is_some() {
                self.order.write().retain(|id| id != connection_id);
            }
            removed
        };

        match removed {
            Some(handle) => {
                info!("{} connection unregistered: {}", self.name, connection_id);
                Some(handle)
            }
            None => {
                debug!(
                    "{} connection {} was already unregistered",
                    self.name, connection_id
                );
                None
            }
        }
    }

    /// Oldest registered connection
    pub fn first(&self) -> Option<(ConnectionId, C)> {
        let connections = self.connections.read();
        let order = self.order.read();
        order.iter().find_map(|id| {
            connections
                .get(id)
                .map(|handle| (id.clone(), handle.clone()))
        })
    }

    /// Copy of every connection in registration order.
    /// Callers iterate the copy so no lock is held while sending.
    pub fn snapshot(&self) -> Vec<(ConnectionId, C)> {
        let connections = self.connections.read();
        let order = self.order.read();
        order
            .iter()
            .filter_map(|id| {
                connections
                    .get(id)
                    .map(|handle| (id.clone(), handle.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_registry_rejects_second_connection() {
        let registry = ConnectionRegistry::bounded("link", 1);
        let first = registry.register("peer-a").unwrap();

        let second = registry.register("peer-b");
        assert!(matches!(second, Err(PipelineError::PeerRejected)));

        // The first connection is untouched
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.first(), Some((first, "peer-a")));
    }

    #[test]
    fn test_slot_reusable_after_unregister() {
        let registry = ConnectionRegistry::bounded("link", 1);
        let first = registry.register(1u32).unwrap();
        assert_eq!(registry.unregister(&first), Some(1));
        assert!(registry.is_empty());

        registry.register(2u32).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unbounded_snapshot_in_registration_order() {
        let registry = ConnectionRegistry::unbounded("playback");
        let ids: Vec<_> = (0..5).map(|i| registry.register(i).unwrap()).collect();
        registry.unregister(&ids[2]);

        let handles: Vec<_> = registry.snapshot().into_iter().map(|(_, c)| c).collect();
        assert_eq!(handles, vec![0, 1, 3, 4]);
        assert_eq!(registry.capacity(), None);
    }

    #[test]
    fn test_double_unregister_is_harmless() {
        let registry = ConnectionRegistry::unbounded("playback");
        let id = registry.register("client").unwrap();
        assert!(registry.unregister(&id).is_some());
        assert!(registry.unregister(&id).is_none());
    }
}
