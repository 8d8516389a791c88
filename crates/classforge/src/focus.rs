//! Focus data: the latest attention telemetry of each student.
//!
//! Writes go through [`record_focus`]: students only. Reads go through
//! [`read_focus`] and [`read_room_focus`]: teachers only.

use classforge_protocol::{RoomId, UserId};
use classforge_store::{FocusDataPoint, FocusWrite, MembershipStore, StoreError, User};
use serde_json::Value;

/// Upserts `payload` as the focus data point of `user` in `room`.
///
/// # Errors
/// - [`StoreError::InvalidInput`] if the payload is empty or the writer
///   is a teacher
/// - [`StoreError::ParticipantNotFound`] if the writer is not a
///   participant of the room
pub async fn record_focus<S: MembershipStore>(
    store: &S,
    room: RoomId,
    user: UserId,
    payload: Value,
) -> Result<FocusWrite, StoreError> {
    if is_empty_payload(&payload) {
        return Err(StoreError::InvalidInput(
            "focus data payload must not be empty".into(),
        ));
    }

    let participant = store.get_participant(room, user).await?;
    if participant.user.role.is_teacher() {
        return Err(StoreError::InvalidInput(
            "only students record focus data".into(),
        ));
    }

    let write = store.upsert_focus_data(room, user, payload).await?;
    tracing::debug!(%room, %user, created = write.created, "focus data recorded");
    Ok(write)
}

/// Returns the latest focus data point of one student in `room`.
///
/// Checks run in this order:
///
/// 1. `student_username` must be given
/// 2. the requester must be a teacher
/// 3. the student must exist
/// 4. the student must be a participant of the room
/// 5. something must have been recorded
///
/// # Errors
/// - [`StoreError::InvalidInput`] if `student_username` is missing or empty
/// - [`StoreError::NotTeacher`] if the requester is a student
/// - [`StoreError::UserNotFound`] if no such student exists
/// - [`StoreError::ParticipantNotFound`] if the student is not in the room
/// - [`StoreError::FocusDataNotFound`] if nothing was recorded yet
pub async fn read_focus<S: MembershipStore>(
    store: &S,
    room: RoomId,
    requester: &User,
    student_username: Option<&str>,
) -> Result<FocusDataPoint, StoreError> {
    let Some(username) = student_username.filter(|name| !name.is_empty()) else {
        return Err(StoreError::InvalidInput(
            "student_username is required".into(),
        ));
    };
    if !requester.role.is_teacher() {
        return Err(StoreError::NotTeacher(requester.id));
    }

    let student = store.user_by_username(username).await?;
    store.get_participant(room, student.id).await?;
    store.get_latest_focus_data(room, student.id).await
}

/// Returns every focus data point of `room`, newest first.
///
/// # Errors
/// [`StoreError::NotTeacher`] if the requester is a student.
pub async fn read_room_focus<S: MembershipStore>(
    store: &S,
    room: RoomId,
    requester: &User,
) -> Result<Vec<FocusDataPoint>, StoreError> {
    if !requester.role.is_teacher() {
        return Err(StoreError::NotTeacher(requester.id));
    }
    store.list_focus_data(room).await
}

/// `null`, `{}`, `[]`, and `""` carry no telemetry.
pub fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
