//! Lock relay: applies client events, expiry sweeps and disconnects to the
//! registry and fans the resulting state changes out to clients.

use std::time::Duration;

use tracing::{debug, info};

use crate::broadcast::{Broadcaster, Recipients};
use crate::events::{ClientEvent, ServerEvent};
use crate::lock::{ConnectionId, Lock};
use crate::registry::LockRegistry;

/// How long a lock is held before the sweeper may reclaim it.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(30);

/// How often the sweeper scans for expired locks.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Owns the lock registry and the broadcaster it reports to.
///
/// Every method runs to completion synchronously, and all broadcasts for one
/// call are issued before it returns. The owner is expected to drive the relay
/// from a single task so registry mutations never interleave.
///
/// There is no authorization: any connection may overwrite or release any lock.
pub struct Relay<B> {
    registry: LockRegistry,
    broadcaster: B,
}

impl<B: Broadcaster> Relay<B> {
    pub fn new(broadcaster: B, lock_duration: Duration) -> Self {
        Self {
            registry: LockRegistry::new(lock_duration),
            broadcaster,
        }
    }

    /// Dispatch one inbound client event from `origin`.
    pub fn handle(&mut self, origin: ConnectionId, event: ClientEvent, now: i64) {
        match event {
            ClientEvent::StartEditing { item_id, user_id } => {
                self.start_editing(origin, &item_id, &user_id, now);
            }
            ClientEvent::FinishEditing { item_id, text } => {
                self.finish_editing(origin, &item_id, text);
            }
            ClientEvent::CancelEditing { item_id } => {
                self.cancel_editing(origin, &item_id);
            }
        }
    }

    /// Lock `item_id` for `user_id` and tell every other client.
    pub fn start_editing(
        &mut self,
        origin: ConnectionId,
        item_id: &str,
        user_id: &str,
        now: i64,
    ) -> Lock {
        let lock = self.registry.acquire(item_id, user_id, origin, now);
        self.broadcaster
            .send(Recipients::AllExcept(origin), &ServerEvent::locked(&lock));
        lock
    }

    /// Clear any lock on `item_id` and commit `text` to every client,
    /// the originator included.
    ///
    /// The update is broadcast whether or not a lock was held.
    pub fn finish_editing(
        &mut self,
        origin: ConnectionId,
        item_id: &str,
        text: String,
    ) -> Option<Lock> {
        let released = self.registry.release(item_id);
        debug!("{} committed {} (lock held: {})", origin, item_id, released.is_some());
        self.broadcaster.send(
            Recipients::All,
            &ServerEvent::ItemUpdated {
                item_id: item_id.to_string(),
                text,
            },
        );
        released
    }

    /// Clear the lock on `item_id` and tell every other client.
    ///
    /// Nothing is broadcast when no lock was held.
    pub fn cancel_editing(&mut self, origin: ConnectionId, item_id: &str) -> Option<Lock> {
        let released = self.registry.release(item_id)?;
        self.broadcaster
            .send(Recipients::AllExcept(origin), &ServerEvent::unlocked(item_id));
        Some(released)
    }

    /// Reclaim locks older than the lock duration; one `itemUnlocked` to all
    /// clients per reclaimed record.
    pub fn sweep(&mut self, now: i64) -> Vec<String> {
        let duration = self.registry.lock_duration();
        let expired = self.registry.sweep_expired(now, duration);
        for item_id in &expired {
            self.broadcaster
                .send(Recipients::All, &ServerEvent::unlocked(item_id.as_str()));
        }
        if !expired.is_empty() {
            info!("Swept {} expired lock(s): {:?}", expired.len(), expired);
        }
        expired
    }

    /// Release every lock owned by a closed connection; one `itemUnlocked` to
    /// all clients per record.
    ///
    /// The caller removes `connection_id` from the broadcaster beforehand so
    /// only remaining clients are notified.
    pub fn reap(&mut self, connection_id: ConnectionId) -> Vec<String> {
        let records = self.registry.find_by_connection(connection_id);
        for item_id in &records {
            if self.registry.release(item_id).is_some() {
                self.broadcaster
                    .send(Recipients::All, &ServerEvent::unlocked(item_id.as_str()));
            }
        }
        if !records.is_empty() {
            info!("Reaped {} lock(s) from {}: {:?}", records.len(), connection_id, records);
        }
        records
    }

    /// Send every active lock to a single connection.
    pub fn replay_locks(&self, connection_id: ConnectionId) -> usize {
        let locks = self.registry.snapshot();
        for lock in &locks {
            self.broadcaster
                .send(Recipients::One(connection_id), &ServerEvent::locked(lock));
        }
        locks.len()
    }

    pub fn registry(&self) -> &LockRegistry {
        &self.registry
    }

    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    pub fn broadcaster_mut(&mut self) -> &mut B {
        &mut self.broadcaster
    }
}
