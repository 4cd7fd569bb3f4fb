use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Sender value used on server-originated code snapshots. Session ids are
/// random alphanumerics, so no client ever matches this and every receiver
/// applies the snapshot.
pub const SNAPSHOT_SENDER: &str = "server";

/// Events a client may send to the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Request membership in a room
    JoinRoom { room: String },

    /// Propose new code for the room. `sender` must be the session's own
    /// identity as delivered in the `connected` handshake.
    CodeChange {
        room: String,
        code: String,
        sender: String,
    },

    /// Exit the current room without dropping the transport
    LeaveRoom,
}

/// Events the service sends to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Transport handshake, one-time: the session's identity for echo
    /// comparison against `code_update.sender`
    #[serde(rename_all = "camelCase")]
    Connected { session_id: String },

    /// One-time per session, on successful join
    #[serde(rename_all = "camelCase")]
    RoleAssigned { is_mentor: bool },

    /// Membership count changed
    #[serde(rename_all = "camelCase")]
    RoomUpdate { student_count: usize },

    /// New shared state. Delivered to every member including the sender;
    /// the receiver discards `code` when `sender` matches its own session
    /// id but always applies `isSolved`.
    #[serde(rename_all = "camelCase")]
    CodeUpdate {
        code: String,
        is_solved: bool,
        sender: String,
    },

    /// Room dissolved, client must exit
    MentorLeft,

    /// Join rejected
    RoomNotFound { message: String },

    /// Generic operation failure, sent to the originating client only
    Error { message: String },
}

impl ServerEvent {
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Parse a raw client frame, rejecting anything that does not match a
/// known event schema.
pub fn decode_client_event(text: &str) -> Result<ClientEvent> {
    serde_json::from_str(text).map_err(|e| SyncError::invalid_payload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_room_wire_format() {
        let event = decode_client_event(r#"{"type":"join_room","room":"r1"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room: "r1".to_string()
            }
        );
    }

    #[test]
    fn test_code_change_wire_format() {
        let event = decode_client_event(
            r#"{"type":"code_change","room":"r1","code":"let x = 2;","sender":"abc"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::CodeChange {
                room: "r1".to_string(),
                code: "let x = 2;".to_string(),
                sender: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_leave_room_wire_format() {
        let event = decode_client_event(r#"{"type":"leave_room"}"#).unwrap();
        assert_eq!(event, ClientEvent::LeaveRoom);
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        // unknown event name
        assert!(decode_client_event(r#"{"type":"make_coffee"}"#).is_err());
        // missing field
        assert!(decode_client_event(r#"{"type":"join_room"}"#).is_err());
        // wrong field type
        assert!(decode_client_event(r#"{"type":"join_room","room":7}"#).is_err());
        // not json at all
        assert!(decode_client_event("hello").is_err());
    }

    #[test]
    fn test_server_event_payload_casing() {
        let text = ServerEvent::RoleAssigned { is_mentor: true }.to_text().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({"type": "role_assigned", "isMentor": true})
        );

        let text = ServerEvent::RoomUpdate { student_count: 3 }.to_text().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({"type": "room_update", "studentCount": 3})
        );

        let text = ServerEvent::CodeUpdate {
            code: "let x = 2;".to_string(),
            is_solved: false,
            sender: "abc".to_string(),
        }
        .to_text()
        .unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({
                "type": "code_update",
                "code": "let x = 2;",
                "isSolved": false,
                "sender": "abc"
            })
        );
    }

    #[test]
    fn test_connected_handshake_format() {
        let text = ServerEvent::Connected {
            session_id: "abc123".to_string(),
        }
        .to_text()
        .unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({"type": "connected", "sessionId": "abc123"})
        );
    }

    #[test]
    fn test_mentor_left_has_no_payload() {
        let text = ServerEvent::MentorLeft.to_text().unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({"type": "mentor_left"})
        );
    }

    #[test]
    fn test_room_not_found_and_error_carry_message() {
        let text = ServerEvent::RoomNotFound {
            message: "Room r9 not found".to_string(),
        }
        .to_text()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "room_not_found");
        assert_eq!(value["message"], "Room r9 not found");

        let text = ServerEvent::Error {
            message: "boom".to_string(),
        }
        .to_text()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "boom");
    }

    #[test]
    fn test_server_event_roundtrip() {
        let event = ServerEvent::CodeUpdate {
            code: "x".to_string(),
            is_solved: true,
            sender: SNAPSHOT_SENDER.to_string(),
        };
        let parsed: ServerEvent = serde_json::from_str(&event.to_text().unwrap()).unwrap();
        assert_eq!(parsed, event);
    }
}
