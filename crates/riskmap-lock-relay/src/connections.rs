//! Set of live client connections and their outbound queues.

use std::collections::HashMap;

use riskmap_lock_core::{Broadcaster, ConnectionId, Recipients, ServerEvent};
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound queue feeding one client's socket writer.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// Live connections, addressed by `Recipients`.
///
/// Sends go onto unbounded per-connection queues so a slow client never
/// stalls the relay task.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    connections: HashMap<ConnectionId, Outbound>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ConnectionId, outbound: Outbound) {
        self.connections.insert(id, outbound);
    }

    /// Remove a connection; returns whether it was present.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }
}

impl Broadcaster for ConnectionSet {
    fn send(&self, to: Recipients, event: &ServerEvent) {
        for (id, outbound) in &self.connections {
            if !to.includes(*id) {
                continue;
            }
            if outbound.send(event.clone()).is_err() {
                debug!("[{}] Dropping {}: connection closed", id, event.name());
            }
        }
    }
}
