//! Codec trait and the JSON implementation.
//!
//! The realtime layer never touches `serde_json` directly when it talks to
//! a socket: it encodes [`ServerEvent`](crate::ServerEvent)s and decodes
//! [`ClientFrame`](crate::ClientFrame)s through a [`Codec`]. Browser
//! clients speak JSON, so [`JsonCodec`] is the only implementation today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts wire types to bytes and back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// session task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be
    /// represented in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do
    /// not match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use classforge_protocol::{Codec, ConnectedUser, JsonCodec, Role, ServerEvent};
///
/// let codec = JsonCodec;
/// let event = ServerEvent::ConnectedUsers {
///     users: vec![ConnectedUser { username: "ada".into(), role: Role::Teacher }],
/// };
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: ServerEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
