use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::lock::{ConnectionId, Lock};

/// Authoritative in-memory mapping `record_id -> Lock`.
///
/// Holds at most one lock per record. The registry is a plain owned value; it
/// is mutated only by whoever owns the `Relay`, so it carries no internal
/// synchronization.
#[derive(Debug, Clone)]
pub struct LockRegistry {
    locks: HashMap<String, Lock>,
    lock_duration: Duration,
}

impl LockRegistry {
    /// Create an empty registry stamping locks with `lock_duration`.
    pub fn new(lock_duration: Duration) -> Self {
        Self {
            locks: HashMap::new(),
            lock_duration,
        }
    }

    /// Duration used to stamp `expires_at` on new locks.
    pub fn lock_duration(&self) -> Duration {
        self.lock_duration
    }

    /// Insert or overwrite the lock for `record_id`.
    ///
    /// Never fails: a concurrent holder is silently replaced (last writer wins).
    pub fn acquire(
        &mut self,
        record_id: &str,
        holder_id: &str,
        connection_id: ConnectionId,
        now: i64,
    ) -> Lock {
        let lock = Lock {
            record_id: record_id.to_string(),
            holder_id: holder_id.to_string(),
            connection_id,
            acquired_at: now,
            expires_at: now.saturating_add(duration_millis(self.lock_duration)),
        };

        if let Some(previous) = self.locks.insert(record_id.to_string(), lock.clone()) {
            debug!(
                "Lock on {} taken over by {} (was {} on {})",
                record_id, holder_id, previous.holder_id, previous.connection_id
            );
        } else {
            debug!(
                "Acquired lock on {} for {} on {} (expires at {})",
                record_id, holder_id, connection_id, lock.expires_at
            );
        }

        lock
    }

    /// Remove and return the lock for `record_id`, if any.
    pub fn release(&mut self, record_id: &str) -> Option<Lock> {
        let released = self.locks.remove(record_id);
        match &released {
            Some(lock) => debug!("Released lock on {} held by {}", record_id, lock.holder_id),
            None => debug!("No lock on {} to release", record_id),
        }
        released
    }

    /// Records whose current lock belongs to `connection_id`, ordered by id.
    ///
    /// A record that was taken over by another connection is not included.
    pub fn find_by_connection(&self, connection_id: ConnectionId) -> Vec<String> {
        let mut records: Vec<String> = self
            .locks
            .values()
            .filter(|lock| lock.connection_id == connection_id)
            .map(|lock| lock.record_id.clone())
            .collect();
        records.sort();
        records
    }

    /// Remove every lock held longer than `duration` at `now` and return
    /// their record ids, ordered by id.
    pub fn sweep_expired(&mut self, now: i64, duration: Duration) -> Vec<String> {
        let duration_ms = duration_millis(duration);
        let mut expired: Vec<String> = self
            .locks
            .values()
            .filter(|lock| lock.is_expired(now, duration_ms))
            .map(|lock| lock.record_id.clone())
            .collect();
        expired.sort();

        for record_id in &expired {
            self.locks.remove(record_id);
        }

        expired
    }

    /// Current lock on `record_id`.
    pub fn get(&self, record_id: &str) -> Option<&Lock> {
        self.locks.get(record_id)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// All current locks, ordered by record id.
    pub fn snapshot(&self) -> Vec<Lock> {
        let mut locks: Vec<Lock> = self.locks.values().cloned().collect();
        locks.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        locks
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
