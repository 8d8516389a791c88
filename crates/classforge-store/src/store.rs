//! The `MembershipStore` trait — what the realtime core needs from
//! persistence.
//!
//! The realtime layer never creates rooms or memberships; it only reads
//! them (to authorize a connection), deletes a membership (kick), and
//! reads or writes focus data. Anything richer (registration, room
//! lifecycle) belongs to the collaborator that owns the database, which is
//! why this trait stays narrow.

use std::future::Future;

use classforge_protocol::{RoomId, UserId};
use serde_json::Value;

use crate::{FocusDataPoint, FocusWrite, Participant, Room, StoreError, User};

/// Persistence operations used by the realtime core.
///
/// Implementations may block on I/O; callers await them from session
/// tasks, never from inside a room actor.
///
/// Implementors may write plain `async fn`s; the returned futures must be
/// `Send` because sessions run on the multi-threaded runtime.
pub trait MembershipStore: Send + Sync + 'static {
    /// Resolves a bearer token to its user.
    ///
    /// # Errors
    /// [`StoreError::InvalidToken`] if the token is unknown.
    fn user_by_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Looks a user up by username.
    ///
    /// # Errors
    /// [`StoreError::UserNotFound`] if no account has this username.
    fn user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Looks a room up by its meeting code (active or not).
    ///
    /// # Errors
    /// [`StoreError::RoomNotFound`] if no room has this code.
    fn get_room_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Fetches one membership row.
    ///
    /// # Errors
    /// [`StoreError::ParticipantNotFound`] if the user never joined.
    fn get_participant(
        &self,
        room: RoomId,
        user: UserId,
    ) -> impl Future<Output = Result<Participant, StoreError>> + Send;

    /// Lists a room's participants in join order.
    fn list_participants(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<Participant>, StoreError>> + Send;

    /// Deletes one membership row and returns it.
    ///
    /// # Errors
    /// [`StoreError::ParticipantNotFound`] if there was nothing to delete.
    fn delete_participant(
        &self,
        room: RoomId,
        user: UserId,
    ) -> impl Future<Output = Result<Participant, StoreError>> + Send;

    /// Creates or overwrites the single focus data point for
    /// (room, user), refreshing its timestamp.
    fn upsert_focus_data(
        &self,
        room: RoomId,
        user: UserId,
        payload: Value,
    ) -> impl Future<Output = Result<FocusWrite, StoreError>> + Send;

    /// Returns the focus data point for (room, user).
    ///
    /// # Errors
    /// [`StoreError::FocusDataNotFound`] if nothing was saved yet.
    fn get_latest_focus_data(
        &self,
        room: RoomId,
        user: UserId,
    ) -> impl Future<Output = Result<FocusDataPoint, StoreError>> + Send;

    /// Returns every focus data point of a room, newest first.
    fn list_focus_data(
        &self,
        room: RoomId,
    ) -> impl Future<Output = Result<Vec<FocusDataPoint>, StoreError>> + Send;
}
