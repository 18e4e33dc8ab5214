//! Connection registry.
//!
//! Tracks the current connection of every online user id for message routing.
//!
//! ```text
//! session task (alice) <-> ConnectionRegistry <-> session task (bob)
//!          |                      |                        |
//!          v                      v                        v
//!    mpsc::Sender        DashMap<String, Connection>   mpsc::Sender
//!                         + AtomicUsize online count
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::connection::Connection;

/// Registry of online users.
///
/// Holds at most one connection per user id. The online counter is only
/// touched while the shard lock for that user id is held: incremented before
/// the inserted entry's guard drops, decremented before the entry is removed.
/// Each id therefore contributes 0 or 1 at every instant and the counter
/// never underflows.
pub struct ConnectionRegistry {
    /// User id to its current connection
    connections: DashMap<String, Connection>,
    /// Number of distinct registered user ids
    online_count: AtomicUsize,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        info!("Creating connection registry");
        Self {
            connections: DashMap::new(),
            online_count: AtomicUsize::new(0),
        }
    }

    /// Register a connection under its user id.
    ///
    /// If the user id already has a connection it is replaced and returned.
    /// The superseded connection is not closed, only dropped from tracking,
    /// and the online count is unchanged.
    #[instrument(skip(self, connection), fields(user_id = %connection.user_id(), connection_id = %connection.connection_id()))]
    pub fn register(&self, connection: Connection) -> Option<Connection> {
        match self.connections.entry(connection.user_id().to_owned()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(connection);
                debug!(previous = %previous.connection_id(), "Replaced existing connection");
                Some(previous)
            }
            Entry::Vacant(entry) => {
                let _guard = entry.insert(connection);
                self.online_count.fetch_add(1, Ordering::AcqRel);
                debug!("Registered new connection");
                None
            }
        }
    }

    /// Remove whatever connection is registered for `user_id`.
    ///
    /// No-op when the user id is not registered.
    #[instrument(skip(self))]
    pub fn unregister(&self, user_id: &str) -> Option<Connection> {
        match self.connections.entry(user_id.to_owned()) {
            Entry::Occupied(entry) => {
                self.online_count.fetch_sub(1, Ordering::AcqRel);
                let removed = entry.remove();
                debug!("Unregistered connection");
                Some(removed)
            }
            Entry::Vacant(_) => {
                debug!("Connection was not registered");
                None
            }
        }
    }

    /// Remove the registration for `user_id` only if it is still held by
    /// `connection_id`.
    ///
    /// Closing a superseded connection must not evict the one that
    /// replaced it.
    #[instrument(skip(self))]
    pub fn unregister_connection(&self, user_id: &str, connection_id: Uuid) -> Option<Connection> {
        match self.connections.entry(user_id.to_owned()) {
            Entry::Occupied(entry) if entry.get().connection_id() == connection_id => {
                self.online_count.fetch_sub(1, Ordering::AcqRel);
                let removed = entry.remove();
                debug!("Unregistered connection");
                Some(removed)
            }
            Entry::Occupied(_) => {
                debug!("Connection was superseded, keeping current registration");
                None
            }
            Entry::Vacant(_) => {
                debug!("Connection was not registered");
                None
            }
        }
    }

    /// Current connection for a user id.
    pub fn lookup(&self, user_id: &str) -> Option<Connection> {
        self.connections.get(user_id).map(|entry| entry.value().clone())
    }

    /// Check if a user id is currently registered.
    pub fn contains(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    /// Snapshot of every registration.
    ///
    /// No map lock is held once this returns, so callers may send freely
    /// while iterating.
    pub fn all(&self) -> Vec<(String, Connection)> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Snapshot of the registered user ids.
    pub fn user_ids(&self) -> Vec<String> {
        self.connections.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of distinct user ids currently registered.
    pub fn online_count(&self) -> usize {
        self.online_count.load(Ordering::Acquire)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("online_count", &self.online_count())
            .finish()
    }
}
