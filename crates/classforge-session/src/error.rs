//! Error types for the session layer.

use classforge_store::StoreError;

use crate::SessionState;

/// Why a connection could not become (or stay) an active session.
///
/// Every variant except [`SessionError::InvalidTransition`] is fatal to
/// the connection attempt: the socket is closed without any broadcast.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was missing, empty, or unknown to the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    Unauthenticated(String),

    /// No room has the requested meeting code.
    #[error("room {0} not found")]
    RoomNotFound(String),

    /// The room was deactivated by its teacher.
    #[error("room {0} is no longer active")]
    RoomInactive(String),

    /// The user never joined the room through the membership API.
    #[error("{username} is not a participant of room {room}")]
    NotAParticipant { username: String, room: String },

    /// A lifecycle step was attempted out of order.
    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// The store failed for a reason other than "not found".
    #[error(transparent)]
    Store(#[from] StoreError),
}
