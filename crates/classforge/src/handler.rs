//! Per-connection handler: admission, room registration, frame routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   0. Finish the WebSocket upgrade (bounded by the handshake timeout)
//!   1. Resolve the meeting code from the request path
//!   2. Authenticate the token and check membership
//!   3. Spawn the writer task and register with the room
//!   4. Loop: receive frames → chat, data, or admin command

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use classforge_protocol::{ClientFrame, Codec, RoomId, ServerEvent, UserId};
use classforge_room::{CloseReason, Member, Outbound, RoomRegistry};
use classforge_session::{Authenticator, Session, SessionState, authorize};
use classforge_store::MembershipStore;
use classforge_transport::{
    Connection, ConnectionId, Handshake, PendingWebSocket, WebSocketConnection,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::ClassforgeError;
use crate::admin::CommandOutcome;
use crate::focus::record_focus;
use crate::server::ServerState;

/// Drop guard that unregisters the session when the handler exits.
///
/// `Drop` is synchronous, so the leave runs in a fire-and-forget task.
/// A leave for a connection the room no longer holds is a no-op.
struct SessionGuard {
    registry: Arc<RoomRegistry>,
    room_id: RoomId,
    user_id: UserId,
    conn_id: ConnectionId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let registry = Arc::clone(&self.registry);
        let (room_id, user_id, conn_id) = (self.room_id, self.user_id, self.conn_id);
        tokio::spawn(async move {
            registry.leave(room_id, user_id, conn_id).await;
        });
    }
}

/// Extracts the meeting code from `/ws/room/<meeting_id>/`.
///
/// The trailing slash is optional; anything else is not a classroom
/// endpoint.
pub fn room_code_from_path(path_segments: &[String]) -> Option<&str> {
    match path_segments {
        [ws, room, code] if ws == "ws" && room == "room" && !code.is_empty() => {
            Some(code.as_str())
        }
        _ => None,
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, S, C>(
    pending: PendingWebSocket,
    state: Arc<ServerState<A, S, C>>,
) -> Result<(), ClassforgeError>
where
    A: Authenticator,
    S: MembershipStore,
    C: Codec + Clone,
{
    let peer = pending.peer_addr();
    let conn = pending.complete().await.inspect_err(|e| {
        tracing::debug!(%peer, error = %e, "WebSocket upgrade failed");
    })?;
    let conn_id = conn.id();
    tracing::debug!(%conn_id, path = conn.request().path(), "handling new connection");

    // --- Step 1: Admission ---
    let mut session = match admit(&conn, &state).await {
        Ok(session) => session,
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "connection refused");
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let user_id = session.user_id();
    let room_id = session.room_id();
    let username = session.user.username.clone();
    let code = session.room.meeting_id.clone();

    // --- Step 2: Writer + registration ---
    let conn = Arc::new(conn);
    let (tx, rx) = mpsc::channel(state.config.session_queue_size.max(1));
    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), rx, state.codec.clone()));

    let member = Member {
        user_id,
        username: username.clone(),
        role: session.role(),
        conn_id,
        sender: tx,
    };
    let snapshot = state.registry.join(room_id, member).await?;
    session.transition(SessionState::Active)?;
    let _guard = SessionGuard {
        registry: Arc::clone(&state.registry),
        room_id,
        user_id,
        conn_id,
    };
    tracing::info!(
        %conn_id,
        %user_id,
        room = %code,
        present = snapshot.len(),
        "session active"
    );

    // --- Step 3: Frame loop ---
    loop {
        let data = tokio::select! {
            ended = &mut writer => {
                match ended {
                    Ok(Some(reason)) => {
                        tracing::info!(%conn_id, %user_id, ?reason, "session closed by room");
                    }
                    Ok(None) => tracing::debug!(%conn_id, "outbound queue closed"),
                    Err(e) => tracing::warn!(%conn_id, error = %e, "writer task failed"),
                }
                break;
            }
            received = recv_frame(conn.as_ref(), state.config.idle_timeout) => match received {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::info!(%conn_id, %user_id, "connection closed");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "connection ended");
                    break;
                }
            },
        };

        let frame = match ClientFrame::decode(&state.codec, &data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%conn_id, %user_id, error = %e, "dropping malformed frame");
                continue;
            }
        };

        match frame {
            ClientFrame::Message { message, timestamp } => {
                let timestamp = timestamp.unwrap_or_else(|| Value::String(Utc::now().to_rfc3339()));
                state
                    .registry
                    .broadcast(room_id, ServerEvent::ChatMessage {
                        message,
                        username: username.clone(),
                        timestamp,
                    })
                    .await;
            }
            ClientFrame::Data { data, .. } => {
                if state.config.persist_data_frames && !session.is_teacher() {
                    if let Err(e) =
                        record_focus(state.store.as_ref(), room_id, user_id, data.clone()).await
                    {
                        tracing::debug!(%conn_id, %user_id, error = %e, "focus data not recorded");
                    }
                }
                state
                    .registry
                    .broadcast(room_id, ServerEvent::Data {
                        data,
                        username: username.clone(),
                        user_id,
                    })
                    .await;
            }
            ClientFrame::AdminCommand { command, user_id: target } => {
                match state.admin.execute(room_id, user_id, &command, target).await {
                    Ok(CommandOutcome::Forbidden) => {}
                    Ok(CommandOutcome::Completed(reply)) => {
                        // Routed through the room: if our queue is full we
                        // are dropped like any slow consumer.
                        state.registry.send_to(room_id, conn_id, reply.to_event()).await;
                        if let Some(kicked) = reply.removed {
                            state.registry.remove_user(room_id, kicked).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%conn_id, %command, error = %e, "admin command failed");
                    }
                }
            }
        }
    }

    session.transition(SessionState::Closed)?;
    // _guard drops here → leave fires; the writer stops once the room
    // releases our queue.
    Ok(())
}

/// Resolves the room code and runs the admission gate.
async fn admit<A, S, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, S, C>,
) -> Result<Session, ClassforgeError>
where
    A: Authenticator,
    S: MembershipStore,
{
    let request = conn.request();
    let segments = request.path_segments();
    let code = room_code_from_path(&segments).ok_or_else(|| {
        classforge_session::SessionError::RoomNotFound(request.path().to_string())
    })?;
    let token = request.query_param("token");

    Ok(authorize(&state.auth, state.store.as_ref(), token, code).await?)
}

/// Receives the next frame, giving up after `idle` if set.
async fn recv_frame(
    conn: &WebSocketConnection,
    idle: Option<Duration>,
) -> Result<Option<Vec<u8>>, ClassforgeError> {
    match idle {
        Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
            Ok(received) => Ok(received?),
            Err(_) => {
                tracing::info!(conn_id = %conn.id(), "idle timeout");
                Ok(None)
            }
        },
        None => Ok(conn.recv().await?),
    }
}

/// Drains the session's outbound queue onto the socket.
///
/// Returns the reason when the room asked for a close, `None` when the
/// queue closed or a send failed. Either way the socket is closed.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut queue: mpsc::Receiver<Outbound>,
    codec: C,
) -> Option<CloseReason> {
    let mut reason = None;
    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Event(event) => {
                let bytes = match codec.encode(event.as_ref()) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(conn_id = %conn.id(), kind = event.kind(), error = %e, "encode failed");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
                    break;
                }
            }
            Outbound::Close(why) => {
                reason = Some(why);
                break;
            }
        }
    }
    let _ = conn.close().await;
    reason
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_room_code_from_path_matches_room_route() {
        let path = segments(&["ws", "room", "abc123"]);
        assert_eq!(room_code_from_path(&path), Some("abc123"));
    }

    #[test]
    fn test_room_code_from_path_rejects_other_routes() {
        assert_eq!(room_code_from_path(&segments(&[])), None);
        assert_eq!(room_code_from_path(&segments(&["ws", "room"])), None);
        assert_eq!(room_code_from_path(&segments(&["ws", "chat", "abc123"])), None);
        assert_eq!(
            room_code_from_path(&segments(&["ws", "room", "abc123", "extra"])),
            None
        );
    }
}
