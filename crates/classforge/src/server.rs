//! `ClassforgeServer` builder and server loop.
//!
//! This is the entry point for running a classroom server. It ties
//! together all the layers: transport → protocol → session → room.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use classforge_protocol::{Codec, JsonCodec};
use classforge_room::RoomRegistry;
use classforge_session::Authenticator;
use classforge_store::MembershipStore;
use classforge_transport::{Transport, WebSocketTransport};

use crate::admin::AdminProcessor;
use crate::handler::handle_connection;
use crate::{ClassforgeError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, S, C> {
    pub(crate) auth: A,
    pub(crate) store: Arc<S>,
    pub(crate) registry: Arc<RoomRegistry>,
    pub(crate) admin: AdminProcessor<S>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Classforge server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use classforge::prelude::*;
///
/// # async fn start() -> Result<(), ClassforgeError> {
/// let store = Arc::new(MemoryStore::new());
/// let server = ClassforgeServer::builder()
///     .bind("0.0.0.0:8000")
///     .build(StoreAuthenticator::new(Arc::clone(&store)), store)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ClassforgeServerBuilder {
    config: ServerConfig,
}

impl ClassforgeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn session_queue_size(mut self, size: usize) -> Self {
        self.config.session_queue_size = size;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Upsert students' `data` frames as focus data.
    pub fn persist_data_frames(mut self, enabled: bool) -> Self {
        self.config.persist_data_frames = enabled;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A, S>(
        self,
        auth: A,
        store: Arc<S>,
    ) -> Result<ClassforgeServer<A, S, JsonCodec>, ClassforgeError>
    where
        A: Authenticator,
        S: MembershipStore,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout);

        let state = Arc::new(ServerState {
            auth,
            admin: AdminProcessor::new(Arc::clone(&store)),
            store,
            registry: Arc::new(RoomRegistry::new(self.config.registry.clone())),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(ClassforgeServer { transport, state })
    }
}

impl Default for ClassforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Classforge server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ClassforgeServer<A, S, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S, C>>,
}

impl ClassforgeServer<(), (), ()> {
    /// Creates a new builder.
    pub fn builder() -> ClassforgeServerBuilder {
        ClassforgeServerBuilder::new()
    }
}

impl<A, S, C> ClassforgeServer<A, S, C>
where
    A: Authenticator,
    S: MembershipStore,
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry of live rooms.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ClassforgeError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then closes every
    /// session in every room.
    ///
    /// Each accepted socket gets its own handler task, which also runs the
    /// WebSocket upgrade.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ClassforgeError> {
        tracing::info!(addr = %self.state.config.bind_addr, "Classforge server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("Classforge server shutting down");
        self.state.registry.shutdown().await;
        self.transport.shutdown().await?;
        Ok(())
    }
}
