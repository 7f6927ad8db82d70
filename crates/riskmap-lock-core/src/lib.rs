//! Core types and logic for the riskmap collaborative-editing lock relay.
//!
//! This crate is transport-agnostic:
//! - `LockRegistry`: record id to current lock holder, with expiry bookkeeping
//! - `ClientEvent` / `ServerEvent`: the JSON wire protocol
//! - `Broadcaster`: fan-out capability addressed by `Recipients`
//! - `Relay`: applies client events, sweeps and disconnects to the registry
//!   and emits the resulting broadcasts

mod broadcast;
mod error;
mod events;
mod lock;
mod registry;
mod relay;

pub use broadcast::{Broadcaster, Recipients};
pub use error::LockError;
pub use events::{ClientEvent, ServerEvent};
pub use lock::{epoch_millis, ConnectionId, Lock};
pub use registry::LockRegistry;
pub use relay::{Relay, DEFAULT_LOCK_DURATION, DEFAULT_SWEEP_INTERVAL};
