//! Wire protocol for the lock relay.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}` with
//! camelCase field names, matching what the browser client emits and listens for.

use serde::{Deserialize, Serialize};

use crate::error::LockError;
use crate::lock::Lock;

/// Events a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    StartEditing { item_id: String, user_id: String },

    #[serde(rename_all = "camelCase")]
    FinishEditing { item_id: String, text: String },

    #[serde(rename_all = "camelCase")]
    CancelEditing { item_id: String },
}

impl ClientEvent {
    /// Parse one inbound text frame.
    pub fn from_json(frame: &str) -> Result<Self, LockError> {
        serde_json::from_str(frame)
            .map_err(|e| LockError::Protocol(format!("Invalid client frame: {}", e)))
    }

    /// Record the event refers to.
    pub fn item_id(&self) -> &str {
        match self {
            ClientEvent::StartEditing { item_id, .. }
            | ClientEvent::FinishEditing { item_id, .. }
            | ClientEvent::CancelEditing { item_id } => item_id,
        }
    }
}

/// Events the relay fans out to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    ItemLocked {
        item_id: String,
        user_id: String,
        /// Unix timestamp (ms) the lock nominally expires
        locked_until: i64,
    },

    #[serde(rename_all = "camelCase")]
    ItemUpdated { item_id: String, text: String },

    #[serde(rename_all = "camelCase")]
    ItemUnlocked { item_id: String },
}

impl ServerEvent {
    /// `itemLocked` announcement for a freshly acquired lock.
    pub fn locked(lock: &Lock) -> Self {
        ServerEvent::ItemLocked {
            item_id: lock.record_id.clone(),
            user_id: lock.holder_id.clone(),
            locked_until: lock.expires_at,
        }
    }

    pub fn unlocked(item_id: impl Into<String>) -> Self {
        ServerEvent::ItemUnlocked {
            item_id: item_id.into(),
        }
    }

    /// Encode as one outbound text frame.
    pub fn to_json(&self) -> Result<String, LockError> {
        serde_json::to_string(self)
            .map_err(|e| LockError::Serialization(format!("Failed to encode event: {}", e)))
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ItemLocked { .. } => "itemLocked",
            ServerEvent::ItemUpdated { .. } => "itemUpdated",
            ServerEvent::ItemUnlocked { .. } => "itemUnlocked",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn test_parse_client_events() {
        let start = ClientEvent::from_json(
            r#"{"event":"startEditing","data":{"itemId":"5","userId":"alice"}}"#,
        )
        .unwrap();
        assert_eq!(
            start,
            ClientEvent::StartEditing {
                item_id: "5".to_string(),
                user_id: "alice".to_string(),
            }
        );

        let finish = ClientEvent::from_json(
            r#"{"event":"finishEditing","data":{"itemId":"5","text":"new value"}}"#,
        )
        .unwrap();
        assert_eq!(finish.item_id(), "5");

        let cancel =
            ClientEvent::from_json(r#"{"event":"cancelEditing","data":{"itemId":"7"}}"#).unwrap();
        assert_eq!(
            cancel,
            ClientEvent::CancelEditing {
                item_id: "7".to_string()
            }
        );
    }

    #[test]
    fn test_reject_malformed_frames() {
        for frame in [
            "not json",
            r#"{"event":"deleteEverything","data":{}}"#,
            r#"{"event":"startEditing","data":{"itemId":"5"}}"#,
            r#"{"itemId":"5","userId":"alice"}"#,
        ] {
            let err = ClientEvent::from_json(frame).unwrap_err();
            assert!(matches!(err, LockError::Protocol(_)), "frame {frame}");
        }
    }

    #[test]
    fn test_server_event_wire_shape() {
        let locked = ServerEvent::ItemLocked {
            item_id: "5".to_string(),
            user_id: "alice".to_string(),
            locked_until: 1_700_000_030_000,
        };
        let value: Value = serde_json::from_str(&locked.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "itemLocked",
                "data": { "itemId": "5", "userId": "alice", "lockedUntil": 1_700_000_030_000i64 }
            })
        );

        let value: Value =
            serde_json::from_str(&ServerEvent::unlocked("9").to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "event": "itemUnlocked", "data": { "itemId": "9" } }));
        assert_eq!(ServerEvent::unlocked("9").name(), "itemUnlocked");
    }
}
