use crate::events::ServerEvent;
use crate::lock::ConnectionId;

/// Addressing mode for one outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// A single connection
    One(ConnectionId),
    /// Every connection except the originator
    AllExcept(ConnectionId),
    /// Every connection
    All,
}

impl Recipients {
    /// Whether `connection_id` is addressed.
    pub fn includes(&self, connection_id: ConnectionId) -> bool {
        match *self {
            Recipients::One(target) => target == connection_id,
            Recipients::AllExcept(origin) => origin != connection_id,
            Recipients::All => true,
        }
    }
}

/// Fan-out capability over the set of connected clients.
///
/// Sends are fire-and-forget: implementations must not block and must not
/// report delivery failures back to the relay.
pub trait Broadcaster {
    fn send(&self, to: Recipients, event: &ServerEvent);
}
