//! Persisted records: users, rooms, memberships, focus data.

use chrono::{DateTime, Utc};
use classforge_protocol::{Role, RoomId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A user account. The password credential lives outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Input for [`MemoryStore::register_user`](crate::MemoryStore::register_user).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// A classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Storage key.
    pub id: RoomId,
    /// Unique code clients use to find and connect to the room.
    pub meeting_id: String,
    pub name: String,
    pub description: Option<String>,
    /// The owning teacher.
    pub teacher_id: UserId,
    /// Cleared (never set again) when the teacher deactivates the room.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for [`MemoryStore::create_room`](crate::MemoryStore::create_room).
#[derive(Debug, Clone, Default)]
pub struct NewRoom {
    pub name: String,
    /// Generated (8 hex characters) when `None` or blank.
    pub meeting_id: Option<String>,
    pub description: Option<String>,
}

/// A membership edge between a user and a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub room_id: RoomId,
    pub user: User,
    /// Whether the participant's telemetry is being collected.
    pub is_tracking: bool,
    pub joined_at: DateTime<Utc>,
}

/// The latest telemetry payload of one participant in one room.
///
/// There is at most one per (room, user): writes overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusDataPoint {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub data: Value,
    /// Refreshed on every write.
    pub timestamp: DateTime<Utc>,
}

/// Result of an upsert: the stored point and whether it was new.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusWrite {
    pub point: FocusDataPoint,
    pub created: bool,
}

/// Result of joining a room through the membership API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new membership row was created.
    Joined(Participant),
    /// The user was already a participant; nothing changed.
    AlreadyJoined(Participant),
}

impl JoinOutcome {
    /// The participant row, new or existing.
    pub fn participant(&self) -> &Participant {
        match self {
            Self::Joined(p) | Self::AlreadyJoined(p) => p,
        }
    }
}
