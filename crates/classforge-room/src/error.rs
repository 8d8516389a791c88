//! Error types for the room layer.

use classforge_protocol::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's actor stopped before answering.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// [`RoomRegistry::shutdown`](crate::RoomRegistry::shutdown) has run;
    /// no new members are accepted.
    #[error("room registry is shutting down")]
    ShuttingDown,
}
