use thiserror::Error;

/// Errors that can occur around the lock relay.
///
/// None of these are raised by lock bookkeeping itself: acquire always
/// succeeds and releasing an absent lock is a no-op.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Relay is no longer running")]
    RelayClosed,
}
