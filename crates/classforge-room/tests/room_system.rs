//! Integration tests for the room registry and its actors.

use std::sync::Arc;

use classforge_protocol::{ConnectedUser, Role, RoomId, ServerEvent, UserId};
use classforge_room::{CloseReason, Member, Outbound, RegistryConfig, RoomError, RoomRegistry};
use classforge_transport::ConnectionId;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn member(
    id: u64,
    name: &str,
    role: Role,
    conn: u64,
    capacity: usize,
) -> (Member, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(capacity);
    let member = Member {
        user_id: UserId(id),
        username: name.into(),
        role,
        conn_id: ConnectionId::new(conn),
        sender: tx,
    };
    (member, rx)
}

fn teacher() -> (Member, mpsc::Receiver<Outbound>) {
    member(1, "T", Role::Teacher, 1, 16)
}

fn student(id: u64, conn: u64) -> (Member, mpsc::Receiver<Outbound>) {
    member(id, &format!("S{}", id - 1), Role::Student, conn, 16)
}

fn presence(name: &str, role: Role) -> ConnectedUser {
    ConnectedUser {
        username: name.into(),
        role,
    }
}

/// Pops the next queued event, panicking on `Close` or an empty queue.
fn next_event(rx: &mut mpsc::Receiver<Outbound>) -> ServerEvent {
    match rx.try_recv() {
        Ok(Outbound::Event(event)) => (*event).clone(),
        other => panic!("expected an event, got {other:?}"),
    }
}

fn drain(rx: &mut mpsc::Receiver<Outbound>) {
    while rx.try_recv().is_ok() {}
}

// =========================================================================
// Join
// =========================================================================

#[tokio::test]
async fn test_join_snapshot_includes_joiner_once() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, _t_rx) = teacher();
    let (s1, _s1_rx) = student(2, 2);

    registry.join(room, t).await.unwrap();
    let snapshot = registry.join(room, s1).await.unwrap();

    assert_eq!(
        snapshot,
        vec![presence("T", Role::Teacher), presence("S1", Role::Student)]
    );
}

#[tokio::test]
async fn test_join_sends_connected_users_then_announces_to_others() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    let (s1, mut s1_rx) = student(2, 2);

    registry.join(room, t).await.unwrap();
    drain(&mut t_rx);
    registry.join(room, s1).await.unwrap();

    assert_eq!(
        next_event(&mut s1_rx),
        ServerEvent::ConnectedUsers {
            users: vec![presence("T", Role::Teacher), presence("S1", Role::Student)],
        }
    );
    assert!(s1_rx.try_recv().is_err(), "joiner must not see its own user_connect");

    assert_eq!(
        next_event(&mut t_rx),
        ServerEvent::user_connect("S1", Role::Student)
    );
}

#[tokio::test]
async fn test_join_same_user_replaces_old_session() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (first, mut first_rx) = student(2, 10);
    let (second, _second_rx) = student(2, 11);

    registry.join(room, first).await.unwrap();
    let snapshot = registry.join(room, second).await.unwrap();

    assert_eq!(snapshot, vec![presence("S1", Role::Student)]);
    drain_events_until_close(&mut first_rx, CloseReason::Replaced);

    // The old connection's leave must not evict the new one.
    assert!(!registry.leave(room, UserId(2), ConnectionId::new(10)).await);
    assert_eq!(registry.snapshot(room).await.len(), 1);
}

fn drain_events_until_close(rx: &mut mpsc::Receiver<Outbound>, expected: CloseReason) {
    loop {
        match rx.try_recv() {
            Ok(Outbound::Event(_)) => continue,
            Ok(Outbound::Close(reason)) => {
                assert_eq!(reason, expected);
                return;
            }
            Err(e) => panic!("expected Close({expected:?}), got {e:?}"),
        }
    }
}

// =========================================================================
// Broadcast
// =========================================================================

#[tokio::test]
async fn test_broadcast_reaches_room_only() {
    let registry = RoomRegistry::default();
    let algebra = RoomId::new_v4();
    let geometry = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    let (s1, mut s1_rx) = student(2, 2);
    let (s2, mut s2_rx) = student(3, 3);

    registry.join(algebra, t).await.unwrap();
    registry.join(algebra, s1).await.unwrap();
    registry.join(geometry, s2).await.unwrap();
    drain(&mut t_rx);
    drain(&mut s1_rx);
    drain(&mut s2_rx);

    let chat = ServerEvent::ChatMessage {
        message: "hi".into(),
        username: "S1".into(),
        timestamp: serde_json::json!(null),
    };
    registry.broadcast(algebra, chat.clone()).await;
    // Snapshot goes through the same mailbox, so the broadcast is done.
    registry.snapshot(algebra).await;

    assert_eq!(next_event(&mut t_rx), chat);
    assert_eq!(next_event(&mut s1_rx), chat, "sender receives its own broadcast");
    assert!(s2_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_broadcast_preserves_sender_order() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    registry.join(room, t).await.unwrap();
    drain(&mut t_rx);

    for i in 0..5 {
        registry
            .broadcast(room, ServerEvent::ChatMessage {
                message: i.to_string(),
                username: "T".into(),
                timestamp: serde_json::json!(i),
            })
            .await;
    }
    registry.snapshot(room).await;

    for i in 0..5 {
        match next_event(&mut t_rx) {
            ServerEvent::ChatMessage { message, .. } => assert_eq!(message, i.to_string()),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_broadcast_unknown_room_is_noop() {
    let registry = RoomRegistry::default();
    registry
        .broadcast(RoomId::new_v4(), ServerEvent::user_disconnect("ghost"))
        .await;
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn test_full_queue_unregisters_member() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    // Capacity 1: the connected_users snapshot fills it.
    let (slow, _slow_rx) = member(2, "S1", Role::Student, 2, 1);
    let (t, mut t_rx) = teacher();

    registry.join(room, slow).await.unwrap();
    let snapshot = registry.join(room, t).await.unwrap();
    assert_eq!(snapshot.len(), 2, "snapshot is taken before delivery");

    next_event(&mut t_rx); // connected_users
    assert_eq!(next_event(&mut t_rx), ServerEvent::user_disconnect("S1"));
    assert_eq!(registry.snapshot(room).await, vec![presence("T", Role::Teacher)]);
}

#[tokio::test]
async fn test_closed_queue_unregisters_member() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    let (s1, s1_rx) = student(2, 2);

    registry.join(room, t).await.unwrap();
    registry.join(room, s1).await.unwrap();
    drop(s1_rx);
    drain(&mut t_rx);

    registry.broadcast(room, ServerEvent::user_connect("x", Role::Student)).await;

    assert_eq!(registry.snapshot(room).await, vec![presence("T", Role::Teacher)]);
    next_event(&mut t_rx);
    assert_eq!(next_event(&mut t_rx), ServerEvent::user_disconnect("S1"));
}

#[tokio::test]
async fn test_send_to_reaches_only_that_connection() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    let (s1, mut s1_rx) = student(2, 2);

    registry.join(room, t).await.unwrap();
    registry.join(room, s1).await.unwrap();
    drain(&mut t_rx);
    drain(&mut s1_rx);

    let reply = ServerEvent::CommandResult {
        success: true,
        message: "User S2 has been kicked".into(),
        command: "kick_user".into(),
    };
    registry.send_to(room, ConnectionId::new(1), reply.clone()).await;
    registry.snapshot(room).await;

    assert_eq!(next_event(&mut t_rx), reply);
    assert!(s1_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_send_to_full_queue_unregisters_member() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    // Capacity 1: the connected_users snapshot fills it.
    let (slow, _slow_rx) = member(2, "S1", Role::Student, 2, 1);

    registry.join(room, t).await.unwrap();
    registry.join(room, slow).await.unwrap();
    drain(&mut t_rx);

    let reply = ServerEvent::CommandResult {
        success: false,
        message: "Unknown command: mute_all".into(),
        command: "mute_all".into(),
    };
    registry.send_to(room, ConnectionId::new(2), reply).await;

    assert_eq!(registry.snapshot(room).await, vec![presence("T", Role::Teacher)]);
    assert_eq!(next_event(&mut t_rx), ServerEvent::user_disconnect("S1"));
}

// =========================================================================
// Leave / remove
// =========================================================================

#[tokio::test]
async fn test_leave_broadcasts_user_disconnect() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    let (s1, _s1_rx) = student(2, 2);

    registry.join(room, t).await.unwrap();
    registry.join(room, s1).await.unwrap();
    drain(&mut t_rx);

    assert!(registry.leave(room, UserId(2), ConnectionId::new(2)).await);

    assert_eq!(next_event(&mut t_rx), ServerEvent::user_disconnect("S1"));
    assert_eq!(registry.snapshot(room).await, vec![presence("T", Role::Teacher)]);
}

#[tokio::test]
async fn test_leave_twice_is_noop() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    let (s1, _s1_rx) = student(2, 2);

    registry.join(room, t).await.unwrap();
    registry.join(room, s1).await.unwrap();
    assert!(registry.leave(room, UserId(2), ConnectionId::new(2)).await);
    drain(&mut t_rx);

    assert!(!registry.leave(room, UserId(2), ConnectionId::new(2)).await);
    registry.snapshot(room).await;
    assert!(t_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_last_leave_retires_room() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, _t_rx) = teacher();

    registry.join(room, t).await.unwrap();
    assert_eq!(registry.room_count().await, 1);

    registry.leave(room, UserId(1), ConnectionId::new(1)).await;
    assert_eq!(registry.room_count().await, 0);
    assert!(registry.snapshot(room).await.is_empty());

    // A fresh join respawns the actor.
    let (t, _t_rx) = teacher();
    assert_eq!(registry.join(room, t).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_room_emptied_by_dropped_member_is_retired_on_leave() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (s1, s1_rx) = student(2, 2);

    registry.join(room, s1).await.unwrap();
    drop(s1_rx);
    registry.broadcast(room, ServerEvent::user_connect("x", Role::Student)).await;
    assert!(registry.snapshot(room).await.is_empty());
    assert_eq!(registry.room_count().await, 1);

    // The dropped session's own leave removes nothing but retires the room.
    assert!(!registry.leave(room, UserId(2), ConnectionId::new(2)).await);
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_racing_last_leave_always_lands() {
    let registry = Arc::new(RoomRegistry::new(RegistryConfig { mailbox_size: 1 }));
    let room = RoomId::new_v4();

    for i in 0..100u64 {
        let (t_conn, s_conn) = (2 * i + 1, 2 * i + 2);
        let (t, _t_rx) = member(1, "T", Role::Teacher, t_conn, 16);
        registry.join(room, t).await.unwrap();

        let leaving = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry.leave(room, UserId(1), ConnectionId::new(t_conn)).await
            })
        };
        let (s1, _s1_rx) = member(2, "S1", Role::Student, s_conn, 16);
        let snapshot = registry.join(room, s1).await.unwrap();
        assert!(leaving.await.unwrap());

        assert!(snapshot.contains(&presence("S1", Role::Student)));
        assert_eq!(registry.snapshot(room).await, vec![presence("S1", Role::Student)]);

        assert!(registry.leave(room, UserId(2), ConnectionId::new(s_conn)).await);
        assert_eq!(registry.room_count().await, 0);
    }
}

#[tokio::test]
async fn test_remove_user_closes_target_and_notifies_room() {
    let registry = RoomRegistry::default();
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    let (s1, mut s1_rx) = student(2, 2);

    registry.join(room, t).await.unwrap();
    registry.join(room, s1).await.unwrap();
    drain(&mut t_rx);

    assert!(registry.remove_user(room, UserId(2)).await);

    drain_events_until_close(&mut s1_rx, CloseReason::Kicked);
    assert_eq!(next_event(&mut t_rx), ServerEvent::user_removed("S1"));
    assert!(!registry.remove_user(room, UserId(2)).await);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_closes_sessions_and_refuses_joins() {
    let registry = RoomRegistry::new(RegistryConfig { mailbox_size: 8 });
    let room = RoomId::new_v4();
    let (t, mut t_rx) = teacher();
    registry.join(room, t).await.unwrap();

    registry.shutdown().await;

    drain_events_until_close(&mut t_rx, CloseReason::Shutdown);
    assert_eq!(registry.room_count().await, 0);

    let (s1, _s1_rx) = student(2, 2);
    let result = registry.join(room, s1).await;
    assert!(matches!(result, Err(RoomError::ShuttingDown)));
}
