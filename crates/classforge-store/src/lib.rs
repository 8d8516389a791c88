//! Persistence for Classforge.
//!
//! The realtime core talks to storage only through [`MembershipStore`]:
//! token lookup, room lookup, membership reads and deletes, and the focus
//! data upsert. [`MemoryStore`] implements it in process memory and also
//! carries the membership API (register, create, join, leave, deactivate)
//! that a classroom frontend drives.
//!
//! ```text
//! Session gate ──► MembershipStore ◄── admin commands / focus writes
//!                        ▲
//!                   MemoryStore (+ membership API)
//! ```

mod error;
mod memory;
mod model;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{
    FocusDataPoint, FocusWrite, JoinOutcome, NewRoom, NewUser, Participant, Room, User,
};
pub use store::MembershipStore;
