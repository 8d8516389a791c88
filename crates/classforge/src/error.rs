//! Unified error type for Classforge.

use classforge_protocol::ProtocolError;
use classforge_room::RoomError;
use classforge_session::SessionError;
use classforge_store::StoreError;
use classforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ClassforgeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A persistence error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The connection was refused admission or misused its lifecycle.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room actor was unavailable or the registry is shutting down.
    #[error(transparent)]
    Room(#[from] RoomError),
}
