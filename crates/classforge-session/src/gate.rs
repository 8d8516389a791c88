//! The admission check every connection passes before joining a room.

use classforge_store::{MembershipStore, StoreError};

use crate::{Authenticator, Session, SessionError, SessionState};

/// Authenticates `token` and checks that its user may enter the room
/// with meeting code `room_code`.
///
/// Checks run in order and stop at the first failure:
///
/// 1. token present, non-empty, and accepted by `auth`
/// 2. the room exists
///
/// With user and room resolved the session is `Connecting`; it then
/// moves to `Authorizing` for the remaining checks:
///
/// 3. the room is active
/// 4. the user is a participant (membership is never created here)
///
/// On success the returned [`Session`] is in the `Authorizing` state.
pub async fn authorize<A, S>(
    auth: &A,
    store: &S,
    token: Option<&str>,
    room_code: &str,
) -> Result<Session, SessionError>
where
    A: Authenticator,
    S: MembershipStore,
{
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SessionError::Unauthenticated("missing token".into()))?;

    let user = auth.authenticate(token).await?;

    let room = store.get_room_by_code(room_code).await.map_err(|e| match e {
        StoreError::RoomNotFound(code) => SessionError::RoomNotFound(code),
        other => other.into(),
    })?;
    let mut session = Session::connecting(user, room);
    session.transition(SessionState::Authorizing)?;

    if !session.room.is_active {
        return Err(SessionError::RoomInactive(session.room.meeting_id));
    }

    match store.get_participant(session.room_id(), session.user_id()).await {
        Ok(_) => {}
        Err(StoreError::ParticipantNotFound { .. }) => {
            return Err(SessionError::NotAParticipant {
                username: session.user.username,
                room: session.room.meeting_id,
            });
        }
        Err(e) => return Err(e.into()),
    }

    tracing::debug!(
        user_id = %session.user_id(),
        room = %session.room.meeting_id,
        "connection authorized"
    );
    Ok(session)
}
