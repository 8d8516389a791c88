//! Admin commands: privileged instructions a teacher sends over the
//! classroom socket.
//!
//! The role check lives here and nowhere else. A requester without the
//! capability gets [`CommandOutcome::Forbidden`], which the connection
//! handler drops without replying.

use std::sync::Arc;

use classforge_protocol::{RoomId, ServerEvent, UserId};
use classforge_store::{MembershipStore, Participant, StoreError};

/// Commands the processor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// Remove a participant from the room.
    KickUser,
}

impl AdminCommand {
    /// Resolves a wire command name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "kick_user" => Some(Self::KickUser),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::KickUser => "kick_user",
        }
    }
}

/// The reply to a command the requester was allowed to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub success: bool,
    pub message: String,
    /// The command name as the client sent it.
    pub command: String,
    /// Set after a successful kick: the user whose live session must be
    /// detached from the room.
    pub removed: Option<UserId>,
}

impl CommandReply {
    fn failed(command: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            command: command.to_string(),
            removed: None,
        }
    }

    /// The `command_result` event sent back to the requester.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::CommandResult {
            success: self.success,
            message: self.message.clone(),
            command: self.command.clone(),
        }
    }
}

/// Result of running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The requester may not issue admin commands; drop silently.
    Forbidden,
    /// Reply to the requester with this result.
    Completed(CommandReply),
}

/// Executes admin commands against a [`MembershipStore`].
pub struct AdminProcessor<S> {
    store: Arc<S>,
}

impl<S: MembershipStore> AdminProcessor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Runs `command` on behalf of `requester` in `room`.
    ///
    /// Evaluation order:
    ///
    /// 1. resolve the command
    /// 2. a teacher target is refused for every requester
    /// 3. the requester must be a teacher participant, else `Forbidden`
    /// 4. unknown commands and a missing `user_id` are reported
    /// 5. a target without a membership row is reported as not found
    /// 6. the membership row is deleted
    ///
    /// # Errors
    /// Store failures other than "not found".
    pub async fn execute(
        &self,
        room: RoomId,
        requester: UserId,
        command: &str,
        target: Option<UserId>,
    ) -> Result<CommandOutcome, StoreError> {
        let resolved = AdminCommand::parse(command);

        let target_row = match (resolved, target) {
            (Some(AdminCommand::KickUser), Some(target)) => {
                self.find_participant(room, target).await?
            }
            _ => None,
        };
        if target_row.as_ref().is_some_and(|p| p.user.role.is_teacher()) {
            tracing::info!(%room, %requester, ?target, "kick of a teacher refused");
            return Ok(CommandOutcome::Completed(CommandReply::failed(
                command,
                "Cannot kick another teacher",
            )));
        }

        if !self.is_teacher_participant(room, requester).await? {
            tracing::debug!(%room, %requester, command, "admin command from non-teacher dropped");
            return Ok(CommandOutcome::Forbidden);
        }

        let Some(resolved) = resolved else {
            return Ok(CommandOutcome::Completed(CommandReply::failed(
                command,
                format!("Unknown command: {command}"),
            )));
        };

        match resolved {
            AdminCommand::KickUser => match (target, target_row) {
                (None, _) => Ok(CommandOutcome::Completed(CommandReply::failed(
                    command,
                    "user_id is required",
                ))),
                (Some(_), None) => Ok(CommandOutcome::Completed(CommandReply::failed(
                    command,
                    "User not found in this room",
                ))),
                (Some(target), Some(_)) => self.remove_participant(room, requester, target).await,
            },
        }
    }

    /// Kicks `target` out of `room` on behalf of `requester`.
    ///
    /// Same rules as [`execute`](Self::execute) with `kick_user`.
    pub async fn kick(
        &self,
        room: RoomId,
        requester: UserId,
        target: UserId,
    ) -> Result<CommandOutcome, StoreError> {
        self.execute(room, requester, AdminCommand::KickUser.as_str(), Some(target))
            .await
    }

    async fn remove_participant(
        &self,
        room: RoomId,
        requester: UserId,
        target: UserId,
    ) -> Result<CommandOutcome, StoreError> {
        let command = AdminCommand::KickUser.as_str();
        match self.store.delete_participant(room, target).await {
            Ok(removed) => {
                tracing::info!(%room, %requester, %target, "participant kicked");
                Ok(CommandOutcome::Completed(CommandReply {
                    success: true,
                    message: format!("User {} has been kicked", removed.user.username),
                    command: command.to_string(),
                    removed: Some(target),
                }))
            }
            Err(StoreError::ParticipantNotFound { .. }) => Ok(CommandOutcome::Completed(
                CommandReply::failed(command, "User not found in this room"),
            )),
            Err(e) => Err(e),
        }
    }

    async fn find_participant(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<Option<Participant>, StoreError> {
        match self.store.get_participant(room, user).await {
            Ok(p) => Ok(Some(p)),
            Err(StoreError::ParticipantNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn is_teacher_participant(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .find_participant(room, user)
            .await?
            .is_some_and(|p| p.user.role.is_teacher()))
    }
}

#[cfg(test)]
mod tests {
    use classforge_protocol::Role;
    use classforge_store::{MemoryStore, NewRoom, NewUser, Room, User};

    use super::*;

    struct Class {
        store: Arc<MemoryStore>,
        admin: AdminProcessor<MemoryStore>,
        room: Room,
        t: User,
        s1: User,
        s2: User,
    }

    async fn class() -> Class {
        let store = Arc::new(MemoryStore::new());
        let mut users = Vec::new();
        for (name, role) in [("T", Role::Teacher), ("S1", Role::Student), ("S2", Role::Student)] {
            let (user, _) = store
                .register_user(NewUser {
                    username: name.into(),
                    email: String::new(),
                    role,
                })
                .await
                .unwrap();
            users.push(user);
        }
        let room = store
            .create_room(users[0].id, NewRoom {
                name: "algebra-101".into(),
                meeting_id: Some("abc123".into()),
                description: None,
            })
            .await
            .unwrap();
        store.join_room("abc123", users[1].id).await.unwrap();
        store.join_room("abc123", users[2].id).await.unwrap();

        let s2 = users.pop().unwrap();
        let s1 = users.pop().unwrap();
        let t = users.pop().unwrap();
        Class {
            admin: AdminProcessor::new(Arc::clone(&store)),
            store,
            room,
            t,
            s1,
            s2,
        }
    }

    fn completed(outcome: CommandOutcome) -> CommandReply {
        match outcome {
            CommandOutcome::Completed(reply) => reply,
            CommandOutcome::Forbidden => panic!("expected a reply, got Forbidden"),
        }
    }

    #[tokio::test]
    async fn test_kick_student_removes_exactly_that_row() {
        let c = class().await;

        let reply = completed(
            c.admin
                .execute(c.room.id, c.t.id, "kick_user", Some(c.s1.id))
                .await
                .unwrap(),
        );

        assert!(reply.success);
        assert_eq!(reply.message, "User S1 has been kicked");
        assert_eq!(reply.removed, Some(c.s1.id));

        let left: Vec<_> = c
            .store
            .list_participants(c.room.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.user.username)
            .collect();
        assert_eq!(left, vec!["T", "S2"]);
    }

    #[tokio::test]
    async fn test_kick_teacher_is_refused_and_store_unchanged() {
        let c = class().await;

        let reply = completed(
            c.admin
                .execute(c.room.id, c.t.id, "kick_user", Some(c.t.id))
                .await
                .unwrap(),
        );

        assert!(!reply.success);
        assert_eq!(reply.message, "Cannot kick another teacher");
        assert_eq!(reply.removed, None);
        assert_eq!(c.store.list_participants(c.room.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_student_kicking_teacher_gets_refusal() {
        let c = class().await;
        let reply = completed(
            c.admin
                .execute(c.room.id, c.s1.id, "kick_user", Some(c.t.id))
                .await
                .unwrap(),
        );
        assert!(!reply.success);
        assert_eq!(reply.message, "Cannot kick another teacher");
    }

    #[tokio::test]
    async fn test_student_kicking_student_is_forbidden() {
        let c = class().await;
        let outcome = c
            .admin
            .execute(c.room.id, c.s1.id, "kick_user", Some(c.s2.id))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Forbidden);
        assert!(c.store.get_participant(c.room.id, c.s2.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_kick_unknown_target_not_found() {
        let c = class().await;
        let reply = completed(
            c.admin
                .execute(c.room.id, c.t.id, "kick_user", Some(UserId(999)))
                .await
                .unwrap(),
        );
        assert!(!reply.success);
        assert_eq!(reply.message, "User not found in this room");
    }

    #[tokio::test]
    async fn test_kick_without_user_id() {
        let c = class().await;
        let reply = completed(
            c.admin
                .execute(c.room.id, c.t.id, "kick_user", None)
                .await
                .unwrap(),
        );
        assert_eq!(reply.message, "user_id is required");
        assert_eq!(reply.command, "kick_user");
    }

    #[tokio::test]
    async fn test_unknown_command_teacher_gets_reply_student_forbidden() {
        let c = class().await;
        let reply = completed(
            c.admin
                .execute(c.room.id, c.t.id, "mute_all", None)
                .await
                .unwrap(),
        );
        assert!(!reply.success);
        assert_eq!(reply.message, "Unknown command: mute_all");
        assert_eq!(reply.command, "mute_all");

        let outcome = c
            .admin
            .execute(c.room.id, c.s1.id, "mute_all", None)
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Forbidden);
    }

    #[tokio::test]
    async fn test_kick_matches_execute() {
        let c = class().await;
        let reply = completed(c.admin.kick(c.room.id, c.t.id, c.s2.id).await.unwrap());
        assert!(reply.success);
        assert_eq!(reply.command, "kick_user");
        assert_eq!(reply.removed, Some(c.s2.id));

        let outcome = c.admin.kick(c.room.id, c.s1.id, c.t.id).await.unwrap();
        assert_eq!(completed(outcome).message, "Cannot kick another teacher");
    }

    #[tokio::test]
    async fn test_non_participant_teacher_is_forbidden() {
        let c = class().await;
        let (other, _) = c
            .store
            .register_user(NewUser {
                username: "T2".into(),
                email: String::new(),
                role: Role::Teacher,
            })
            .await
            .unwrap();
        let outcome = c
            .admin
            .execute(c.room.id, other.id, "kick_user", Some(c.s1.id))
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::Forbidden);
    }

    #[test]
    fn test_command_reply_to_event() {
        let reply = CommandReply::failed("kick_user", "User not found in this room");
        assert_eq!(
            reply.to_event(),
            ServerEvent::CommandResult {
                success: false,
                message: "User not found in this room".into(),
                command: "kick_user".into(),
            }
        );
    }
}
