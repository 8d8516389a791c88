//! # Classforge
//!
//! Realtime backend for virtual classrooms.
//!
//! Clients connect to `ws://<host>/ws/room/<meeting_id>/?token=<token>`.
//! Once admitted they see who is present, chat, relay telemetry to the
//! room, and (teachers only) issue admin commands such as `kick_user`.
//!
//! The layers, bottom to top:
//!
//! - `classforge-transport` — WebSocket accept, split send/recv
//! - `classforge-protocol` — client frames, server events, JSON codec
//! - `classforge-store` — users, rooms, memberships, focus data
//! - `classforge-session` — token authentication and room admission
//! - `classforge-room` — per-room presence and broadcast actors
//!
//! This crate wires them into a [`ClassforgeServer`] and adds the admin
//! command processor ([`admin`]) and focus data access rules ([`focus`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use classforge::prelude::*;
//!
//! # async fn start() -> Result<(), ClassforgeError> {
//! let store = Arc::new(MemoryStore::new());
//! let server = ClassforgeServer::builder()
//!     .bind("0.0.0.0:8000")
//!     .persist_data_frames(true)
//!     .build(StoreAuthenticator::new(Arc::clone(&store)), store)
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod admin;
mod config;
mod error;
pub mod focus;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::ClassforgeError;
pub use server::{ClassforgeServer, ClassforgeServerBuilder};

/// Everything needed to run a server and drive the membership API.
pub mod prelude {
    pub use crate::admin::{AdminProcessor, CommandOutcome, CommandReply};
    pub use crate::focus::{read_focus, read_room_focus, record_focus};
    pub use crate::{ClassforgeError, ClassforgeServer, ClassforgeServerBuilder, ServerConfig};

    pub use classforge_protocol::{
        ClientFrame, Codec, ConnectedUser, JsonCodec, Role, RoomId, ServerEvent, UserId,
    };
    pub use classforge_room::{RegistryConfig, RoomRegistry};
    pub use classforge_session::{Authenticator, SessionError, StoreAuthenticator};
    pub use classforge_store::{
        FocusDataPoint, JoinOutcome, MembershipStore, MemoryStore, NewRoom, NewUser,
        Participant, Room, StoreError, User,
    };
}
