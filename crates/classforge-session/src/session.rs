//! Session types: the server's record of one authorized connection.

use classforge_protocol::{Role, RoomId, UserId};
use classforge_store::{Room, User};

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a classroom connection.
///
/// ```text
///   Connecting ──► Authorizing ──► Active ──► Closed
///                       │                       ▲
///                       └───────────────────────┘
/// ```
///
/// `Authorizing → Closed` covers auth failure, unknown or inactive room,
/// and non-participants. `Active → Closed` covers transport close, idle
/// timeout, and forced closes (kick, replacement, shutdown, slow
/// consumer). Every state may fall straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The token and meeting code resolved to a user and a room.
    Connecting,
    /// Room state and membership are being checked.
    Authorizing,
    /// Registered with the room; frames flow.
    Active,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Whether `self → next` is a legal step.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Authorizing) | (Authorizing, Active) | (Connecting | Authorizing | Active, Closed)
        )
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An authorized user bound to one room.
///
/// Created by [`authorize`](crate::authorize) in `Connecting` and
/// returned in `Authorizing`; the connection handler moves it to `Active` once the room has
/// registered it.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub room: Room,
    state: SessionState,
}

impl Session {
    pub(crate) fn connecting(user: User, room: Room) -> Self {
        Self {
            user,
            room,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `next`.
    ///
    /// # Errors
    /// [`SessionError::InvalidTransition`] if the step is not allowed; the
    /// state is left unchanged.
    pub fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(
            user_id = %self.user.id,
            room = %self.room.meeting_id,
            from = ?self.state,
            to = ?next,
            "session state changed"
        );
        self.state = next;
        Ok(())
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn room_id(&self) -> RoomId {
        self.room.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_teacher(&self) -> bool {
        self.user.role.is_teacher()
    }
}
