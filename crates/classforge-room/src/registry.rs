//! Room registry: spawns room actors on demand and routes to them.

use std::collections::HashMap;
use std::sync::Arc;

use classforge_protocol::{ConnectedUser, RoomId, ServerEvent, UserId};
use classforge_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::room::{JoinAttempt, RoomCommand, RoomHandle, spawn_room};
use crate::{Member, RegistryConfig, RoomError};

/// A join retries on a fresh actor at most this many times when the one
/// it found was retiring.
const JOIN_ATTEMPTS: usize = 3;

#[derive(Default)]
struct Rooms {
    handles: HashMap<RoomId, RoomHandle>,
    closed: bool,
}

/// Tracks one actor per room with live sessions.
///
/// Built once at server start and shared by `Arc` with every connection.
/// A room's actor is spawned by its first join and stopped once its last
/// member leaves.
///
/// The map lock is only held to look up, insert, or remove a handle; no
/// room command is sent while holding it. A join that races a retiring
/// actor gets its member handed back and retries on a fresh actor.
pub struct RoomRegistry {
    config: RegistryConfig,
    rooms: Mutex<Rooms>,
}

impl RoomRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            rooms: Mutex::new(Rooms::default()),
        }
    }

    /// Registers a session and returns the room's snapshot, which includes
    /// the new member.
    ///
    /// Inside the room this also:
    /// - closes any older session of the same user
    /// - sends `connected_users` to the joiner
    /// - sends `user_connect` to every other member
    ///
    /// # Errors
    /// [`RoomError::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn join(
        &self,
        room_id: RoomId,
        mut member: Member,
    ) -> Result<Vec<ConnectedUser>, RoomError> {
        for _ in 0..JOIN_ATTEMPTS {
            let handle = self.live_handle(room_id).await?;
            match handle.join(member).await? {
                JoinAttempt::Joined(snapshot) => return Ok(snapshot),
                JoinAttempt::Retired(returned) => {
                    tracing::debug!(%room_id, "room retired during join, retrying");
                    member = returned;
                }
            }
        }
        Err(RoomError::Unavailable(room_id))
    }

    /// Unregisters a session if `conn_id` is still the one registered for
    /// `user_id`, then tells the rest of the room. A stale or repeated
    /// leave is a no-op and returns `false`.
    pub async fn leave(&self, room_id: RoomId, user_id: UserId, conn_id: ConnectionId) -> bool {
        let Some(handle) = self.handle(room_id).await else {
            return false;
        };
        let result = handle
            .call(|reply| RoomCommand::Leave {
                user_id,
                conn_id,
                reply,
            })
            .await;
        self.settle(room_id, result).await
    }

    /// Forcibly detaches `user_id`'s live session: it is told to close and
    /// the room receives `user_disconnect`. Returns `false` if the user had
    /// no live session.
    pub async fn remove_user(&self, room_id: RoomId, user_id: UserId) -> bool {
        let Some(handle) = self.handle(room_id).await else {
            return false;
        };
        let result = handle
            .call(|reply| RoomCommand::Remove { user_id, reply })
            .await;
        self.settle(room_id, result).await
    }

    /// Delivers `event` to every session of the room, the sender's own
    /// included. Unknown or empty rooms are a silent no-op.
    pub async fn broadcast(&self, room_id: RoomId, event: ServerEvent) {
        let Some(handle) = self.handle(room_id).await else {
            tracing::debug!(%room_id, kind = event.kind(), "broadcast to empty room");
            return;
        };
        if let Err(e) = handle.broadcast(Arc::new(event)).await {
            tracing::debug!(%room_id, error = %e, "broadcast dropped");
        }
    }

    /// Delivers `event` to the session on `conn_id` only, in order with the
    /// room's broadcasts. A session that cannot take it is dropped like any
    /// unresponsive member.
    pub async fn send_to(&self, room_id: RoomId, conn_id: ConnectionId, event: ServerEvent) {
        let Some(handle) = self.handle(room_id).await else {
            tracing::debug!(%room_id, %conn_id, kind = event.kind(), "no room for direct send");
            return;
        };
        if let Err(e) = handle.send_to(conn_id, Arc::new(event)).await {
            tracing::debug!(%room_id, %conn_id, error = %e, "direct send dropped");
        }
    }

    /// `[{username, role}]` of the room's live sessions in join order.
    pub async fn snapshot(&self, room_id: RoomId) -> Vec<ConnectedUser> {
        let Some(handle) = self.handle(room_id).await else {
            return Vec::new();
        };
        handle
            .call(|reply| RoomCommand::Snapshot { reply })
            .await
            .unwrap_or_default()
    }

    /// Number of rooms with a running actor.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.handles.len()
    }

    /// Closes every session in every room and refuses further joins.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = {
            let mut rooms = self.rooms.lock().await;
            rooms.closed = true;
            rooms.handles.drain().map(|(_, h)| h).collect()
        };
        tracing::info!(rooms = handles.len(), "shutting down room registry");
        for handle in handles {
            let _ = handle.call(|reply| RoomCommand::Shutdown { reply }).await;
        }
    }

    async fn handle(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.lock().await.handles.get(&room_id).cloned()
    }

    /// Returns the room's running actor, spawning one if there is none or
    /// the registered one has retired.
    async fn live_handle(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        let mut rooms = self.rooms.lock().await;
        if rooms.closed {
            return Err(RoomError::ShuttingDown);
        }
        if let Some(handle) = rooms.handles.get(&room_id).filter(|h| !h.is_retired()) {
            return Ok(handle.clone());
        }
        let handle = spawn_room(room_id, self.config.mailbox_size);
        rooms.handles.insert(room_id, handle.clone());
        Ok(handle)
    }

    /// Interprets a `(removed, remaining)` reply, retiring the actor when
    /// the room is empty. A room can also be emptied by dropping an
    /// unresponsive member, so an empty room is reaped even when this call
    /// removed nobody.
    async fn settle(&self, room_id: RoomId, result: Result<(bool, usize), RoomError>) -> bool {
        match result {
            Ok((removed, remaining)) => {
                if remaining == 0 {
                    self.reap_if_empty(room_id).await;
                }
                removed
            }
            Err(e) => {
                tracing::debug!(%room_id, error = %e, "room unavailable");
                false
            }
        }
    }

    /// Stops the room's actor if it is still empty and forgets its handle,
    /// unless a newer actor has already replaced it.
    async fn reap_if_empty(&self, room_id: RoomId) {
        let Some(handle) = self.handle(room_id).await else {
            return;
        };
        let stopped = handle
            .call(|reply| RoomCommand::ReapIfEmpty { reply })
            .await
            .unwrap_or(true);
        if !stopped {
            return;
        }
        let mut rooms = self.rooms.lock().await;
        if rooms
            .handles
            .get(&room_id)
            .is_some_and(|current| current.same_actor(&handle))
        {
            rooms.handles.remove(&room_id);
            tracing::debug!(%room_id, "room retired");
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
