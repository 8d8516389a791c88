//! Connection admission for Classforge.
//!
//! Before a socket may join a room it must pass the gate:
//!
//! 1. **Authentication** — the bearer token resolves to a user
//!    ([`Authenticator`] trait, [`StoreAuthenticator`])
//! 2. **Authorization** — the room exists, is active, and the user is one
//!    of its participants ([`authorize`])
//!
//! The result is a [`Session`], whose [`SessionState`] the connection
//! handler drives to `Active` and finally `Closed`.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← registers Active sessions
//!     ↕
//! Session Layer (this crate)  ← identity and admission
//!     ↕
//! Store / Protocol (below)  ← users, rooms, memberships
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod gate;
mod session;

pub use auth::{Authenticator, StoreAuthenticator};
pub use error::SessionError;
pub use gate::authorize;
pub use session::{Session, SessionState};
