//! The relay task.
//!
//! One tokio task owns the `Relay` (and with it the lock registry and the
//! connection set). Socket handlers, the sweeper and HTTP handlers talk to it
//! through a `RelayHandle`, so every registry mutation runs on that single
//! task in arrival order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use riskmap_lock_core::{
    epoch_millis, ClientEvent, ConnectionId, Lock, LockError, Relay, ServerEvent,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connections::ConnectionSet;

/// Settings for the relay task.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    pub lock_duration: Duration,
    pub replay_locks_on_connect: bool,
}

/// Point-in-time view of the relay, for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStatus {
    pub connections: usize,
    pub locks: Vec<Lock>,
}

enum Command {
    Connect {
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    },
    Client {
        id: ConnectionId,
        event: ClientEvent,
    },
    Disconnect {
        id: ConnectionId,
    },
    Sweep,
    Status {
        reply: oneshot::Sender<RelayStatus>,
    },
    Shutdown,
}

/// Cloneable handle to the relay task.
///
/// All sends are non-blocking; they fail only once the task has stopped.
#[derive(Clone)]
pub struct RelayHandle {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
}

impl RelayHandle {
    /// Register a new connection and return its id and outbound queue.
    pub fn connect(
        &self,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<ServerEvent>), LockError> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        self.send(Command::Connect { id, outbound })?;
        Ok((id, outbound_rx))
    }

    /// Forward one client event.
    pub fn dispatch(&self, id: ConnectionId, event: ClientEvent) -> Result<(), LockError> {
        self.send(Command::Client { id, event })
    }

    /// Report a closed connection; its locks are reaped.
    pub fn disconnect(&self, id: ConnectionId) -> Result<(), LockError> {
        self.send(Command::Disconnect { id })
    }

    /// Ask the relay to reclaim expired locks now.
    pub fn sweep(&self) -> Result<(), LockError> {
        self.send(Command::Sweep)
    }

    pub async fn status(&self) -> Result<RelayStatus, LockError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        reply_rx.await.map_err(|_| LockError::RelayClosed)
    }

    /// Stop the relay task after it drains already queued commands.
    pub fn shutdown(&self) -> Result<(), LockError> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> Result<(), LockError> {
        self.commands.send(command).map_err(|_| LockError::RelayClosed)
    }
}

/// Spawn the relay task.
pub fn spawn_relay(options: RelayOptions) -> (RelayHandle, JoinHandle<()>) {
    let (commands, commands_rx) = mpsc::unbounded_channel();
    let relay = Relay::new(ConnectionSet::new(), options.lock_duration);
    let task = tokio::spawn(run(relay, commands_rx, options.replay_locks_on_connect));

    let handle = RelayHandle {
        commands,
        next_id: Arc::new(AtomicU64::new(1)),
    };
    (handle, task)
}

async fn run(
    mut relay: Relay<ConnectionSet>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    replay_locks_on_connect: bool,
) {
    debug!("Relay task started");

    while let Some(command) = commands.recv().await {
        match command {
            Command::Connect { id, outbound } => {
                relay.broadcaster_mut().insert(id, outbound);
                info!("[{}] Client connected ({} total)", id, relay.broadcaster().len());
                if replay_locks_on_connect {
                    let replayed = relay.replay_locks(id);
                    debug!("[{}] Replayed {} active lock(s)", id, replayed);
                }
            }
            Command::Client { id, event } => {
                debug!("[{}] {:?}", id, event);
                relay.handle(id, event, epoch_millis());
            }
            Command::Disconnect { id } => {
                if !relay.broadcaster_mut().remove(id) {
                    warn!("[{}] Disconnect for unknown connection", id);
                }
                info!("[{}] Client disconnected ({} remaining)", id, relay.broadcaster().len());
                relay.reap(id);
            }
            Command::Sweep => {
                relay.sweep(epoch_millis());
            }
            Command::Status { reply } => {
                let status = RelayStatus {
                    connections: relay.broadcaster().len(),
                    locks: relay.registry().snapshot(),
                };
                let _ = reply.send(status);
            }
            Command::Shutdown => break,
        }
    }

    info!("Relay task stopped with {} active lock(s)", relay.registry().len());
}
