//! Room actor: an isolated Tokio task that owns one room's live sessions.
//!
//! The actor never awaits anything but its own mailbox. Delivery to
//! sessions uses `try_send` on their bounded queues, so one stalled client
//! cannot hold up the rest of the room.

use std::collections::VecDeque;
use std::sync::Arc;

use classforge_protocol::{ConnectedUser, Role, RoomId, ServerEvent, UserId};
use classforge_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::RoomError;

/// Why a room told a session to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The same user connected again; the newer connection wins.
    Replaced,
    /// A teacher removed the user from the room.
    Kicked,
    /// The server is shutting down.
    Shutdown,
}

/// An item in a session's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// An event to encode and write to the socket.
    Event(Arc<ServerEvent>),
    /// Stop writing and close the connection.
    Close(CloseReason),
}

/// Sending half of a session's bounded outbound queue.
pub type OutboundSender = mpsc::Sender<Outbound>;

/// A session's registration in a room.
///
/// The room holds the only strong [`OutboundSender`]; once the member is
/// removed the queue closes and the session's writer winds down.
#[derive(Debug)]
pub struct Member {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub conn_id: ConnectionId,
    pub sender: OutboundSender,
}

impl Member {
    fn presence(&self) -> ConnectedUser {
        ConnectedUser {
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Result of handing a member to a room actor.
pub(crate) enum JoinAttempt {
    /// Registered; the snapshot includes the new member.
    Joined(Vec<ConnectedUser>),
    /// The actor was retiring; the member comes back untouched.
    Retired(Member),
}

/// Commands sent to a room actor through its mailbox.
pub(crate) enum RoomCommand {
    /// Register a session and reply with the snapshot that includes it.
    Join {
        member: Member,
        reply: oneshot::Sender<JoinAttempt>,
    },

    /// Unregister a session if `conn_id` is still the user's registered
    /// connection. Replies with whether it was removed and how many
    /// members remain.
    Leave {
        user_id: UserId,
        conn_id: ConnectionId,
        reply: oneshot::Sender<(bool, usize)>,
    },

    /// Deliver an event to every member, sender included.
    Broadcast { event: Arc<ServerEvent> },

    /// Deliver an event to one connection only.
    SendTo {
        conn_id: ConnectionId,
        event: Arc<ServerEvent>,
    },

    /// Request the presence list.
    Snapshot {
        reply: oneshot::Sender<Vec<ConnectedUser>>,
    },

    /// Force a user out (after a kick).
    Remove {
        user_id: UserId,
        reply: oneshot::Sender<(bool, usize)>,
    },

    /// Stop the actor if it has no members. Replies `true` if it stopped.
    ReapIfEmpty { reply: oneshot::Sender<bool> },

    /// Close every member and stop.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle to a running room actor.
///
/// Cheap to clone: it is just an `mpsc::Sender` wrapper.
#[derive(Clone)]
pub(crate) struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Enqueues a command that carries a reply channel and returns the
    /// receiving end without waiting for the answer.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<oneshot::Receiver<T>, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        Ok(reply_rx)
    }

    /// Enqueues a command and waits for its reply.
    pub(crate) async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        self.request(make)
            .await?
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Hands `member` to the actor.
    ///
    /// A mailbox slot is reserved before the member is moved, so a retired
    /// actor hands the member back instead of dropping it.
    pub(crate) async fn join(&self, member: Member) -> Result<JoinAttempt, RoomError> {
        let Ok(permit) = self.sender.reserve().await else {
            return Ok(JoinAttempt::Retired(member));
        };
        let (reply, reply_rx) = oneshot::channel();
        permit.send(RoomCommand::Join { member, reply });
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Whether the actor stopped taking commands.
    pub(crate) fn is_retired(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles address the same actor.
    pub(crate) fn same_actor(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Enqueues a broadcast (fire-and-forget).
    pub(crate) async fn broadcast(&self, event: Arc<ServerEvent>) -> Result<(), RoomError> {
        self.post(RoomCommand::Broadcast { event }).await
    }

    /// Enqueues a delivery to one connection (fire-and-forget).
    pub(crate) async fn send_to(
        &self,
        conn_id: ConnectionId,
        event: Arc<ServerEvent>,
    ) -> Result<(), RoomError> {
        self.post(RoomCommand::SendTo { conn_id, event }).await
    }

    async fn post(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    /// Live sessions in join order.
    members: Vec<Member>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::debug!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { member, reply } => {
                    let snapshot = self.handle_join(member);
                    let _ = reply.send(JoinAttempt::Joined(snapshot));
                }
                RoomCommand::Leave {
                    user_id,
                    conn_id,
                    reply,
                } => {
                    let removed = self.handle_leave(user_id, conn_id);
                    let _ = reply.send((removed, self.members.len()));
                }
                RoomCommand::Broadcast { event } => {
                    self.fan_out(event, None);
                }
                RoomCommand::SendTo { conn_id, event } => {
                    self.send_to(conn_id, event);
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                RoomCommand::Remove { user_id, reply } => {
                    let removed = self.handle_remove(user_id);
                    let _ = reply.send((removed, self.members.len()));
                }
                RoomCommand::ReapIfEmpty { reply } => {
                    let empty = self.members.is_empty();
                    let _ = reply.send(empty);
                    if empty {
                        self.retire().await;
                        break;
                    }
                }
                RoomCommand::Shutdown { reply } => {
                    tracing::info!(
                        room_id = %self.room_id,
                        members = self.members.len(),
                        "room shutting down"
                    );
                    for member in self.members.drain(..) {
                        let _ = member.sender.try_send(Outbound::Close(CloseReason::Shutdown));
                    }
                    let _ = reply.send(());
                    self.retire().await;
                    break;
                }
            }
        }

        tracing::debug!(room_id = %self.room_id, "room actor stopped");
    }

    /// Closes the mailbox and answers what is still queued as an empty
    /// room would. Queued joins get their member back.
    async fn retire(&mut self) {
        self.receiver.close();
        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { member, reply } => {
                    let _ = reply.send(JoinAttempt::Retired(member));
                }
                RoomCommand::Leave { reply, .. } | RoomCommand::Remove { reply, .. } => {
                    let _ = reply.send((false, 0));
                }
                RoomCommand::Broadcast { .. } | RoomCommand::SendTo { .. } => {}
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(Vec::new());
                }
                RoomCommand::ReapIfEmpty { reply } => {
                    let _ = reply.send(true);
                }
                RoomCommand::Shutdown { reply } => {
                    let _ = reply.send(());
                }
            }
        }
    }

    fn handle_join(&mut self, member: Member) -> Vec<ConnectedUser> {
        if let Some(pos) = self.members.iter().position(|m| m.user_id == member.user_id) {
            let old = self.members.remove(pos);
            tracing::info!(
                room_id = %self.room_id,
                user_id = %old.user_id,
                old_conn = %old.conn_id,
                new_conn = %member.conn_id,
                "replacing existing session"
            );
            let _ = old.sender.try_send(Outbound::Close(CloseReason::Replaced));
        }

        let conn_id = member.conn_id;
        let announce = ServerEvent::user_connect(&member.username, member.role);
        tracing::info!(
            room_id = %self.room_id,
            user_id = %member.user_id,
            %conn_id,
            members = self.members.len() + 1,
            "member joined"
        );
        self.members.push(member);

        let snapshot = self.snapshot();
        self.send_to(
            conn_id,
            Arc::new(ServerEvent::ConnectedUsers {
                users: snapshot.clone(),
            }),
        );
        self.fan_out(Arc::new(announce), Some(conn_id));
        snapshot
    }

    fn handle_leave(&mut self, user_id: UserId, conn_id: ConnectionId) -> bool {
        let Some(pos) = self
            .members
            .iter()
            .position(|m| m.user_id == user_id && m.conn_id == conn_id)
        else {
            return false;
        };
        let member = self.members.remove(pos);
        tracing::info!(
            room_id = %self.room_id,
            %user_id,
            %conn_id,
            members = self.members.len(),
            "member left"
        );
        self.fan_out(
            Arc::new(ServerEvent::user_disconnect(&member.username)),
            None,
        );
        true
    }

    fn handle_remove(&mut self, user_id: UserId) -> bool {
        let Some(pos) = self.members.iter().position(|m| m.user_id == user_id) else {
            return false;
        };
        let member = self.members.remove(pos);
        let _ = member.sender.try_send(Outbound::Close(CloseReason::Kicked));
        tracing::info!(
            room_id = %self.room_id,
            %user_id,
            conn_id = %member.conn_id,
            "member removed"
        );
        self.fan_out(
            Arc::new(ServerEvent::user_removed(&member.username)),
            None,
        );
        true
    }

    /// Delivers `event` to every member except `skip`. Members whose queue
    /// is full or closed are unregistered, and the rest of the room is
    /// told they left.
    fn fan_out(&mut self, event: Arc<ServerEvent>, skip: Option<ConnectionId>) {
        let mut pending = VecDeque::from([(event, skip)]);

        while let Some((event, skip)) = pending.pop_front() {
            let room_id = self.room_id;
            let mut dropped = Vec::new();
            self.members.retain(|m| {
                if Some(m.conn_id) == skip {
                    return true;
                }
                match m.sender.try_send(Outbound::Event(Arc::clone(&event))) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            %room_id,
                            user_id = %m.user_id,
                            conn_id = %m.conn_id,
                            error = %e,
                            "dropping unresponsive member"
                        );
                        dropped.push(m.username.clone());
                        false
                    }
                }
            });
            for username in dropped {
                pending.push_back((Arc::new(ServerEvent::user_disconnect(&username)), None));
            }
        }
    }

    /// Delivers to one connection. A failure unregisters it like
    /// [`fan_out`](Self::fan_out) does.
    fn send_to(&mut self, conn_id: ConnectionId, event: Arc<ServerEvent>) {
        let Some(pos) = self.members.iter().position(|m| m.conn_id == conn_id) else {
            return;
        };
        if self.members[pos].sender.try_send(Outbound::Event(event)).is_err() {
            let member = self.members.remove(pos);
            tracing::warn!(
                room_id = %self.room_id,
                user_id = %member.user_id,
                %conn_id,
                "dropping unresponsive member"
            );
            self.fan_out(
                Arc::new(ServerEvent::user_disconnect(&member.username)),
                None,
            );
        }
    }

    fn snapshot(&self) -> Vec<ConnectedUser> {
        self.members.iter().map(Member::presence).collect()
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `mailbox_size` controls backpressure: callers wait when the mailbox is
/// full.
pub(crate) fn spawn_room(room_id: RoomId, mailbox_size: usize) -> RoomHandle {
    let (tx, rx) = mpsc::channel(mailbox_size.max(1));

    let actor = RoomActor {
        room_id,
        members: Vec::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
