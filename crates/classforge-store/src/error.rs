//! Error types for the persistence layer.

use classforge_protocol::{RoomId, UserId};

/// Errors returned by a [`MembershipStore`](crate::MembershipStore) or the
/// membership API on [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No room has this meeting code.
    #[error("room {0} not found")]
    RoomNotFound(String),

    /// The room exists but was deactivated by its teacher.
    #[error("room {0} is no longer active")]
    RoomInactive(String),

    /// The user has no membership row in the room.
    #[error("user {user} is not a participant of room {room}")]
    ParticipantNotFound { room: RoomId, user: UserId },

    /// No focus data has been saved for this participant yet.
    #[error("no focus data for user {user} in room {room}")]
    FocusDataNotFound { room: RoomId, user: UserId },

    /// No user account matches.
    #[error("user {0} not found")]
    UserNotFound(String),

    /// The bearer token is unknown or revoked.
    #[error("invalid token")]
    InvalidToken,

    /// Usernames are unique.
    #[error("username {0} is already taken")]
    UsernameTaken(String),

    /// Meeting codes are unique.
    #[error("meeting id {0} is already taken")]
    MeetingIdTaken(String),

    /// Only teachers may create rooms or read focus data.
    #[error("user {0} is not a teacher")]
    NotTeacher(UserId),

    /// Only the owning teacher may deactivate a room.
    #[error("user {user} is not the teacher of room {meeting_id}")]
    NotRoomOwner { user: UserId, meeting_id: String },

    /// A teacher joins their own room implicitly at creation.
    #[error("user {user} is the teacher of room {meeting_id}")]
    OwnerCannotJoin { user: UserId, meeting_id: String },

    /// Input failed validation (empty username, blank payload, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
