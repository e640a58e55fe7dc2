//! Relay protocol for collaboration.
//!
//! Messages are JSON objects tagged by `type`. Document updates travel as
//! base64-encoded Loro update bytes.

use crate::presence::{ConnectionId, Presence};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Messages sent to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a board room
    Join { room: String },
    /// Leave current room
    Leave,
    /// CRDT update bytes (base64)
    Sync { data: String },
    /// Own presence (cursor, selection, pencil draft)
    Presence { presence: Presence },
}

/// Messages received from the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join with current state
    Joined {
        room: String,
        connection_id: ConnectionId,
        peer_count: usize,
        /// Snapshot of the room document, if it has history
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_sync: Option<String>,
    },
    PeerJoined { connection_id: ConnectionId },
    PeerLeft { connection_id: ConnectionId },
    /// CRDT update bytes from another participant
    Sync { from: ConnectionId, data: String },
    /// Presence of another participant
    Presence {
        connection_id: ConnectionId,
        presence: Presence,
    },
    Error { message: String },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// What an incoming message did to local state.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    JoinedRoom {
        room: String,
        connection_id: ConnectionId,
        peer_count: usize,
    },
    PeerJoined { connection_id: ConnectionId },
    PeerLeft { connection_id: ConnectionId },
    /// Remote document updates were merged
    SyncReceived { from: ConnectionId, bytes: usize },
    PresenceReceived { connection_id: ConnectionId },
    Error { message: String },
}

pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn base64_decode(input: &str) -> Option<Vec<u8>> {
    STANDARD.decode(input).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_client_message_format() {
        let json = serde_json::to_string(&ClientMessage::Join { room: "b1".into() }).unwrap();
        assert_eq!(json, r#"{"type":"join","room":"b1"}"#);

        let json = serde_json::to_string(&ClientMessage::Leave).unwrap();
        assert_eq!(json, r#"{"type":"leave"}"#);
    }

    #[test]
    fn test_parse_server_messages() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"joined","room":"b1","connection_id":7,"peer_count":2}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Joined {
                room: "b1".into(),
                connection_id: 7,
                peer_count: 2,
                initial_sync: None,
            }
        );

        let msg: ServerMessage = serde_json::from_str(r#"{"type":"peer_left","connection_id":3}"#).unwrap();
        assert_eq!(msg, ServerMessage::PeerLeft { connection_id: 3 });
    }

    #[test]
    fn test_presence_message() {
        let mut presence = Presence::default();
        presence.cursor = Some(Point::new(1.0, 2.0));
        let msg = ClientMessage::Presence { presence };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.starts_with(r#"{"type":"presence""#));
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_base64() {
        assert_eq!(base64_encode(b"board"), "Ym9hcmQ=");
        assert_eq!(base64_decode("Ym9hcmQ="), Some(b"board".to_vec()));
        assert_eq!(base64_decode("not base64!"), None);
    }
}
