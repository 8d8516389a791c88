//! Server configuration.

use std::time::Duration;

use classforge_room::RegistryConfig;

/// Settings for a [`ClassforgeServer`](crate::ClassforgeServer).
///
/// Start from `ServerConfig::default()` and override what you need, or
/// use the setters on [`ClassforgeServerBuilder`](crate::ClassforgeServerBuilder).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Capacity of each session's outbound queue. A session whose queue
    /// fills up is dropped from its room.
    pub session_queue_size: usize,

    /// How long a client may take to complete the WebSocket upgrade.
    pub handshake_timeout: Duration,

    /// Close a session after this long without an inbound frame.
    /// `None` keeps idle sessions open indefinitely.
    pub idle_timeout: Option<Duration>,

    /// Also upsert students' `data` frames as their focus data point.
    pub persist_data_frames: bool,

    /// Room actor settings.
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            session_queue_size: 256,
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: None,
            persist_data_frames: false,
            registry: RegistryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.session_queue_size, 256);
        assert_eq!(config.registry.mailbox_size, 64);
        assert!(config.idle_timeout.is_none());
        assert!(!config.persist_data_frames);
    }
}
