//! Room presence and fan-out for Classforge.
//!
//! Each live room runs as an isolated Tokio task (actor model) that owns
//! the set of connected sessions. Joins, leaves, broadcasts, and
//! snapshots for a room all pass through its single mailbox, so they are
//! applied one at a time and in order.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — spawns room actors on demand and routes to them
//! - [`Member`] — a session's registration: identity plus outbound queue
//! - [`Outbound`] — what a room pushes into a session's queue
//! - [`RegistryConfig`] — mailbox sizing

mod config;
mod error;
mod registry;
mod room;

pub use config::RegistryConfig;
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{CloseReason, Member, Outbound, OutboundSender};
