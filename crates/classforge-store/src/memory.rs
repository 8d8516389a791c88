//! In-memory store: the `MembershipStore` used by the demo server and the
//! test suites, plus the membership API a classroom frontend drives
//! (register, create/join/leave/deactivate rooms).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use classforge_protocol::{RoomId, UserId};
use rand::Rng;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    FocusDataPoint, FocusWrite, JoinOutcome, MembershipStore, NewRoom, NewUser,
    Participant, Room, StoreError, User,
};

/// A membership row without the joined user record.
#[derive(Debug, Clone)]
struct Membership {
    is_tracking: bool,
    joined_at: DateTime<Utc>,
    /// Insertion order, so listings are stable even when timestamps tie.
    seq: u64,
}

#[derive(Debug, Clone)]
struct FocusRow {
    data: Value,
    timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    next_user_id: u64,
    next_seq: u64,
    users: HashMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    tokens: HashMap<String, UserId>,
    rooms: HashMap<RoomId, Room>,
    codes: HashMap<String, RoomId>,
    participants: HashMap<(RoomId, UserId), Membership>,
    focus: HashMap<(RoomId, UserId), FocusRow>,
}

impl Tables {
    fn room_by_code(&self, code: &str) -> Result<&Room, StoreError> {
        self.codes
            .get(code)
            .and_then(|id| self.rooms.get(id))
            .ok_or_else(|| StoreError::RoomNotFound(code.to_string()))
    }

    fn user(&self, id: UserId) -> Result<&User, StoreError> {
        self.users
            .get(&id)
            .ok_or_else(|| StoreError::UserNotFound(id.to_string()))
    }

    fn participant(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<Participant, StoreError> {
        let row = self
            .participants
            .get(&(room, user))
            .ok_or(StoreError::ParticipantNotFound { room, user })?;
        Ok(Participant {
            room_id: room,
            user: self.user(user)?.clone(),
            is_tracking: row.is_tracking,
            joined_at: row.joined_at,
        })
    }

    fn insert_participant(
        &mut self,
        room: RoomId,
        user: UserId,
        is_tracking: bool,
    ) {
        self.next_seq += 1;
        self.participants.insert(
            (room, user),
            Membership {
                is_tracking,
                joined_at: Utc::now(),
                seq: self.next_seq,
            },
        );
    }

    fn focus_point(
        &self,
        room: RoomId,
        user: UserId,
        row: &FocusRow,
    ) -> FocusDataPoint {
        FocusDataPoint {
            room_id: room,
            user_id: user,
            username: self
                .users
                .get(&user)
                .map(|u| u.username.clone())
                .unwrap_or_default(),
            data: row.data.clone(),
            timestamp: row.timestamp,
        }
    }
}

/// A [`MembershipStore`] that keeps every table in process memory.
///
/// All tables sit behind one `RwLock`, so each operation is atomic with
/// respect to the others (the same guarantee a transaction gives the
/// HTTP layer's "get or create" joins and focus upserts).
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Accounts ---------------------------------------------------------

    /// Creates a user account and issues its bearer token.
    ///
    /// # Errors
    /// - [`StoreError::InvalidInput`] for a blank username
    /// - [`StoreError::UsernameTaken`] if the name exists
    pub async fn register_user(
        &self,
        new: NewUser,
    ) -> Result<(User, String), StoreError> {
        let username = new.username.trim().to_string();
        if username.is_empty() {
            return Err(StoreError::InvalidInput(
                "username must not be empty".into(),
            ));
        }

        let mut tables = self.tables.write().await;
        if tables.usernames.contains_key(&username) {
            return Err(StoreError::UsernameTaken(username));
        }

        tables.next_user_id += 1;
        let user = User {
            id: UserId(tables.next_user_id),
            username: username.clone(),
            email: new.email,
            role: new.role,
        };
        let token = generate_token();
        tables.usernames.insert(username, user.id);
        tables.tokens.insert(token.clone(), user.id);
        tables.users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok((user, token))
    }

    /// Returns the user's bearer token, issuing one if they have none.
    pub async fn issue_token(&self, user: UserId) -> Result<String, StoreError> {
        let mut tables = self.tables.write().await;
        tables.user(user)?;
        if let Some((token, _)) = tables.tokens.iter().find(|(_, id)| **id == user) {
            return Ok(token.clone());
        }
        let token = generate_token();
        tables.tokens.insert(token.clone(), user);
        Ok(token)
    }

    /// Invalidates a bearer token. Unknown tokens are ignored.
    pub async fn revoke_token(&self, token: &str) {
        self.tables.write().await.tokens.remove(token);
    }

    // -- Room lifecycle ---------------------------------------------------

    /// Creates a room owned by `teacher` and makes the teacher its first
    /// (tracking) participant.
    ///
    /// # Errors
    /// - [`StoreError::NotTeacher`] if the owner is a student
    /// - [`StoreError::MeetingIdTaken`] if the requested code exists
    pub async fn create_room(
        &self,
        teacher: UserId,
        new: NewRoom,
    ) -> Result<Room, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.user(teacher)?.role.is_teacher() {
            return Err(StoreError::NotTeacher(teacher));
        }

        let meeting_id = match new.meeting_id.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                if tables.codes.contains_key(code) {
                    return Err(StoreError::MeetingIdTaken(code.to_string()));
                }
                code.to_string()
            }
            _ => loop {
                let code = generate_meeting_id();
                if !tables.codes.contains_key(&code) {
                    break code;
                }
            },
        };

        let room = Room {
            id: RoomId::new_v4(),
            meeting_id: meeting_id.clone(),
            name: new.name,
            description: new.description,
            teacher_id: teacher,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.codes.insert(meeting_id, room.id);
        tables.rooms.insert(room.id, room.clone());
        tables.insert_participant(room.id, teacher, true);

        tracing::info!(room = %room.meeting_id, %teacher, "room created");
        Ok(room)
    }

    /// Makes `user` a participant of the room with this code.
    ///
    /// Joining twice is not an error: the existing row is returned as
    /// [`JoinOutcome::AlreadyJoined`].
    ///
    /// # Errors
    /// - [`StoreError::RoomNotFound`] / [`StoreError::RoomInactive`]
    /// - [`StoreError::OwnerCannotJoin`] for the room's own teacher
    pub async fn join_room(
        &self,
        code: &str,
        user: UserId,
    ) -> Result<JoinOutcome, StoreError> {
        let mut tables = self.tables.write().await;
        let room = tables.room_by_code(code)?;
        if !room.is_active {
            return Err(StoreError::RoomInactive(code.to_string()));
        }
        if room.teacher_id == user {
            return Err(StoreError::OwnerCannotJoin {
                user,
                meeting_id: code.to_string(),
            });
        }
        let room_id = room.id;
        tables.user(user)?;

        if let Ok(existing) = tables.participant(room_id, user) {
            return Ok(JoinOutcome::AlreadyJoined(existing));
        }
        tables.insert_participant(room_id, user, true);
        tracing::info!(room = code, %user, "participant joined");
        Ok(JoinOutcome::Joined(tables.participant(room_id, user)?))
    }

    /// Removes `user`'s membership of the room with this code.
    pub async fn leave_room(&self, code: &str, user: UserId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let room_id = tables.room_by_code(code)?.id;
        tables
            .participants
            .remove(&(room_id, user))
            .ok_or(StoreError::ParticipantNotFound { room: room_id, user })?;
        tracing::info!(room = code, %user, "participant left");
        Ok(())
    }

    /// Marks a room inactive. Only its teacher may do this, and there is
    /// no way back. Memberships are kept.
    pub async fn deactivate_room(
        &self,
        code: &str,
        user: UserId,
    ) -> Result<Room, StoreError> {
        let mut tables = self.tables.write().await;
        let room_id = tables.room_by_code(code)?.id;
        let room = tables
            .rooms
            .get_mut(&room_id)
            .filter(|room| room.teacher_id == user)
            .ok_or_else(|| StoreError::NotRoomOwner {
                user,
                meeting_id: code.to_string(),
            })?;
        room.is_active = false;
        tracing::info!(room = code, "room deactivated");
        Ok(room.clone())
    }
}

impl MembershipStore for MemoryStore {
    async fn user_by_token(&self, token: &str) -> Result<User, StoreError> {
        let tables = self.tables.read().await;
        let id = tables.tokens.get(token).ok_or(StoreError::InvalidToken)?;
        tables.user(*id).cloned()
    }

    async fn user_by_username(&self, username: &str) -> Result<User, StoreError> {
        let tables = self.tables.read().await;
        tables
            .usernames
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    async fn get_room_by_code(&self, code: &str) -> Result<Room, StoreError> {
        self.tables.read().await.room_by_code(code).cloned()
    }

    async fn get_participant(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<Participant, StoreError> {
        self.tables.read().await.participant(room, user)
    }

    async fn list_participants(
        &self,
        room: RoomId,
    ) -> Result<Vec<Participant>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .participants
            .iter()
            .filter(|((r, _), _)| *r == room)
            .map(|((_, u), m)| (m.seq, *u))
            .collect();
        rows.sort_unstable();
        rows.into_iter()
            .map(|(_, user)| tables.participant(room, user))
            .collect()
    }

    async fn delete_participant(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<Participant, StoreError> {
        let mut tables = self.tables.write().await;
        let participant = tables.participant(room, user)?;
        tables.participants.remove(&(room, user));
        Ok(participant)
    }

    async fn upsert_focus_data(
        &self,
        room: RoomId,
        user: UserId,
        payload: Value,
    ) -> Result<FocusWrite, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.rooms.contains_key(&room) {
            return Err(StoreError::RoomNotFound(room.to_string()));
        }
        tables.user(user)?;

        let row = FocusRow {
            data: payload,
            timestamp: Utc::now(),
        };
        let created = tables.focus.insert((room, user), row.clone()).is_none();
        Ok(FocusWrite {
            point: tables.focus_point(room, user, &row),
            created,
        })
    }

    async fn get_latest_focus_data(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<FocusDataPoint, StoreError> {
        let tables = self.tables.read().await;
        let row = tables
            .focus
            .get(&(room, user))
            .ok_or(StoreError::FocusDataNotFound { room, user })?;
        Ok(tables.focus_point(room, user, row))
    }

    async fn list_focus_data(
        &self,
        room: RoomId,
    ) -> Result<Vec<FocusDataPoint>, StoreError> {
        let tables = self.tables.read().await;
        let mut points: Vec<_> = tables
            .focus
            .iter()
            .filter(|((r, _), _)| *r == room)
            .map(|((r, u), row)| tables.focus_point(*r, *u, row))
            .collect();
        points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(points)
    }
}

/// Generates a 40-character hex bearer token (160 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 20] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generates an 8-character meeting code from a fresh UUID.
fn generate_meeting_id() -> String {
    let mut code = Uuid::new_v4().simple().to_string();
    code.truncate(8);
    code
}
