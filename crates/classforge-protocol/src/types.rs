//! Core protocol types for Classforge's wire format.
//!
//! Every frame on a classroom socket is a flat JSON object tagged by a
//! `type` field. Clients send [`ClientFrame`]s; the server pushes
//! [`ServerEvent`]s. The identifiers ([`UserId`], [`RoomId`]) and
//! [`Role`] are shared with the store and session layers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{Codec, ProtocolError};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user account.
///
/// Serialized as a plain number (`#[serde(transparent)]`) so admin
/// commands can carry `"user_id": 7`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// The storage key of a room.
///
/// Distinct from the human-chosen meeting code clients connect with; the
/// code can be anything, the key is always a random UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub Uuid);

impl RoomId {
    /// Generates a fresh random room key.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A user's role. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    /// Returns `true` for [`Role::Teacher`].
    pub fn is_teacher(self) -> bool {
        matches!(self, Self::Teacher)
    }

    /// The lowercase wire name (`"teacher"` / `"student"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a room's "who is connected" snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedUser {
    pub username: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// ClientFrame — client → server
// ---------------------------------------------------------------------------

/// A frame sent by a connected client.
///
/// ```text
/// {"type": "message", "message": "hi", "timestamp": "10:02"}
/// {"type": "data", "data": {"focused": true}}
/// {"type": "admin_command", "command": "kick_user", "user_id": 7}
/// ```
///
/// A frame without a `type` is treated as a chat `message`; use
/// [`ClientFrame::decode`] rather than decoding the enum directly to get
/// that default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Chat text for the whole room.
    Message {
        #[serde(default)]
        message: String,
        /// Client-side timestamp, passed through untouched (clients send
        /// either a string or epoch millis).
        #[serde(default)]
        timestamp: Option<Value>,
    },

    /// Telemetry or any other opaque signal for the whole room.
    Data {
        #[serde(default = "empty_object")]
        data: Value,
        #[serde(default)]
        timestamp: Option<Value>,
    },

    /// A privileged instruction, e.g. `kick_user`.
    AdminCommand {
        command: String,
        #[serde(default)]
        user_id: Option<UserId>,
    },
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl ClientFrame {
    /// Decodes a frame, defaulting a missing `type` to `"message"`.
    ///
    /// # Errors
    /// - [`ProtocolError::Decode`] for malformed JSON, an unknown `type`,
    ///   or a missing required field
    /// - [`ProtocolError::InvalidMessage`] if the frame is not an object
    pub fn decode<C: Codec>(codec: &C, data: &[u8]) -> Result<Self, ProtocolError> {
        let mut value: Value = codec.decode(data)?;
        let fields = value.as_object_mut().ok_or_else(|| {
            ProtocolError::InvalidMessage("frame must be a JSON object".into())
        })?;
        fields
            .entry("type")
            .or_insert_with(|| Value::String("message".into()));
        serde_json::from_value(value).map_err(ProtocolError::Decode)
    }

    /// The frame's wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Data { .. } => "data",
            Self::AdminCommand { .. } => "admin_command",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent — server → client
// ---------------------------------------------------------------------------

/// An event pushed to connected clients.
///
/// Everything except `connected_users` and `command_result` is fanned out
/// to a whole room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once to a session right after it joins: who is connected.
    ConnectedUsers { users: Vec<ConnectedUser> },

    /// Someone joined the room.
    UserConnect {
        message: String,
        username: String,
        role: Role,
    },

    /// Someone left, was removed, or dropped off the room.
    UserDisconnect { message: String, username: String },

    /// A chat line.
    ChatMessage {
        message: String,
        username: String,
        timestamp: Value,
    },

    /// A relayed telemetry/signal payload.
    Data {
        data: Value,
        username: String,
        user_id: UserId,
    },

    /// Outcome of an admin command, sent only to the issuer.
    CommandResult {
        success: bool,
        message: String,
        command: String,
    },
}

impl ServerEvent {
    /// `user_connect` with the standard "has joined" message.
    pub fn user_connect(username: &str, role: Role) -> Self {
        Self::UserConnect {
            message: format!("{username} has joined the room"),
            username: username.to_string(),
            role,
        }
    }

    /// `user_disconnect` with the standard "has left" message.
    pub fn user_disconnect(username: &str) -> Self {
        Self::UserDisconnect {
            message: format!("{username} has left the room"),
            username: username.to_string(),
        }
    }

    /// `user_disconnect` for a participant removed by a teacher.
    pub fn user_removed(username: &str) -> Self {
        Self::UserDisconnect {
            message: format!("{username} was removed from the room"),
            username: username.to_string(),
        }
    }

    /// The event's wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectedUsers { .. } => "connected_users",
            Self::UserConnect { .. } => "user_connect",
            Self::UserDisconnect { .. } => "user_disconnect",
            Self::ChatMessage { .. } => "chat_message",
            Self::Data { .. } => "data",
            Self::CommandResult { .. } => "command_result",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The frontend parses these shapes by hand, so the tests pin the JSON
    //! field names rather than round-tripping every variant.

    use serde_json::json;

    use super::*;
    use crate::JsonCodec;

    fn decode(raw: &str) -> Result<ClientFrame, ProtocolError> {
        ClientFrame::decode(&JsonCodec, raw.as_bytes())
    }

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&UserId(42)).unwrap(), "42");
        assert_eq!(UserId(7).to_string(), "U-7");
    }

    #[test]
    fn test_room_id_serializes_as_uuid_string() {
        let id = RoomId::new_v4();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, json!(id.0.to_string()));
        assert!(id.to_string().starts_with("R-"));
    }

    #[test]
    fn test_role_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_value(Role::Teacher).unwrap(), json!("teacher"));
        let role: Role = serde_json::from_value(json!("student")).unwrap();
        assert_eq!(role, Role::Student);
        assert!(Role::Teacher.is_teacher());
        assert!(!Role::Student.is_teacher());
    }

    // =====================================================================
    // ClientFrame
    // =====================================================================

    #[test]
    fn test_decode_chat_message() {
        let frame = decode(r#"{"type":"message","message":"hi","timestamp":"10:02"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Message {
                message: "hi".into(),
                timestamp: Some(json!("10:02")),
            }
        );
    }

    #[test]
    fn test_decode_missing_type_defaults_to_message() {
        let frame = decode(r#"{"message":"no tag"}"#).unwrap();
        assert_eq!(frame.kind(), "message");
    }

    #[test]
    fn test_decode_data_defaults_to_empty_object() {
        let frame = decode(r#"{"type":"data"}"#).unwrap();
        match frame {
            ClientFrame::Data { data, timestamp } => {
                assert_eq!(data, json!({}));
                assert!(timestamp.is_none());
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_admin_command_with_numeric_user_id() {
        let frame =
            decode(r#"{"type":"admin_command","command":"kick_user","user_id":7}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::AdminCommand {
                command: "kick_user".into(),
                user_id: Some(UserId(7)),
            }
        );
    }

    #[test]
    fn test_decode_unknown_type_is_error() {
        assert!(matches!(
            decode(r#"{"type":"fly_to_moon"}"#),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_non_object_is_invalid() {
        assert!(matches!(
            decode("[1,2,3]"),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(decode("not json at all").is_err());
    }

    // =====================================================================
    // ServerEvent
    // =====================================================================

    #[test]
    fn test_connected_users_json_format() {
        let event = ServerEvent::ConnectedUsers {
            users: vec![ConnectedUser {
                username: "T".into(),
                role: Role::Teacher,
            }],
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "connected_users", "users": [{"username": "T", "role": "teacher"}]})
        );
    }

    #[test]
    fn test_user_connect_json_format() {
        let event = ServerEvent::user_connect("S1", Role::Student);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "user_connect",
                "message": "S1 has joined the room",
                "username": "S1",
                "role": "student",
            })
        );
    }

    #[test]
    fn test_user_disconnect_json_format() {
        let json = serde_json::to_value(ServerEvent::user_disconnect("S1")).unwrap();
        assert_eq!(json["type"], "user_disconnect");
        assert_eq!(json["username"], "S1");
        assert_eq!(json["message"], "S1 has left the room");
    }

    #[test]
    fn test_data_event_carries_sender_id() {
        let event = ServerEvent::Data {
            data: json!({"focused": false}),
            username: "S1".into(),
            user_id: UserId(3),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "data");
        assert_eq!(json["user_id"], 3);
        assert_eq!(json["data"]["focused"], false);
    }

    #[test]
    fn test_command_result_json_format() {
        let event = ServerEvent::CommandResult {
            success: false,
            message: "Cannot kick another teacher".into(),
            command: "kick_user".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "command_result",
                "success": false,
                "message": "Cannot kick another teacher",
                "command": "kick_user",
            })
        );
    }
}
