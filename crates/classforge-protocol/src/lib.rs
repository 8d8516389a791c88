//! Wire protocol for Classforge.
//!
//! - **Types** ([`ClientFrame`], [`ServerEvent`], [`UserId`], [`RoomId`],
//!   [`Role`]) — what travels over a classroom socket.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those types become
//!   bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (ClientFrame / ServerEvent) → Session
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ClientFrame, ConnectedUser, Role, RoomId, ServerEvent, UserId};
