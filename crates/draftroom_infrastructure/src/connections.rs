use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::RwLock;

use draftroom_interface::errors::{AppError, Result};

/// Per-user socket bookkeeping. A user may hold several connections at
/// once (multiple tabs or devices), so online state is derived from the
/// set of live connection ids rather than a single flag; only the last
/// connection closing takes a user offline.
#[derive(Default)]
pub struct ConnectionTracker {
    connections: RwLock<HashMap<String, HashSet<SocketAddr>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection. Returns true when this is the user's first live
    /// connection. Registering the same pair twice is a no-op.
    pub fn register(&self, user_id: &str, socket_addr: SocketAddr) -> Result<bool> {
        let mut connections = self
            .connections
            .write()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?;

        let sockets = connections.entry(user_id.to_string()).or_default();
        let was_offline = sockets.is_empty();
        sockets.insert(socket_addr);
        Ok(was_offline)
    }

    /// Drop a connection. Returns true when the user has no connections
    /// left and is now offline.
    pub fn deregister(&self, user_id: &str, socket_addr: SocketAddr) -> Result<bool> {
        let mut connections = self
            .connections
            .write()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?;

        match connections.get_mut(user_id) {
            Some(sockets) => {
                sockets.remove(&socket_addr);
                if sockets.is_empty() {
                    connections.remove(user_id);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Ok(false),
        }
    }

    pub fn is_online(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .connections
            .read()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .get(user_id)
            .is_some_and(|sockets| !sockets.is_empty()))
    }

    pub fn connection_count(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .connections
            .read()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .get(user_id)
            .map_or(0, HashSet::len))
    }

    pub fn clear(&self) -> Result<()> {
        self.connections
            .write()
            .map_err(|e| AppError::LockError { msg: e.to_string() })?
            .clear();
        Ok(())
    }
}
