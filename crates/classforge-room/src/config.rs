//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Settings shared by every room actor the registry spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Capacity of each room actor's command mailbox. Callers wait when
    /// it is full, so this bounds how far a busy room can fall behind.
    pub mailbox_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { mailbox_size: 64 }
    }
}
