use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one transport-level client connection.
///
/// Only used to reap locks when the connection drops, never for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Exclusive, time-bounded editing intent on one record.
///
/// Locks are replace-only: a new acquisition for the same record produces a
/// fresh `Lock` rather than patching this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    /// Record being edited
    #[serde(rename = "itemId")]
    pub record_id: String,
    /// User holding the lock
    #[serde(rename = "userId")]
    pub holder_id: String,
    /// Connection that requested the lock
    #[serde(skip)]
    pub connection_id: ConnectionId,
    /// Unix timestamp (ms) when the lock was acquired
    pub acquired_at: i64,
    /// Unix timestamp (ms) after which the sweeper may reclaim the lock
    #[serde(rename = "lockedUntil")]
    pub expires_at: i64,
}

impl Lock {
    /// Whether the lock has been held longer than `duration_ms` at `now`.
    pub fn is_expired(&self, now: i64, duration_ms: i64) -> bool {
        now.saturating_sub(self.acquired_at) > duration_ms
    }
}

/// Current wall-clock time as Unix milliseconds.
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
