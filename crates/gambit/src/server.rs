//! `GambitServer` builder and server loop.
//!
//! This is the entry point for running a Gambit session server. It ties
//! together all the layers: transport → protocol → registry → session.

use std::sync::Arc;

use gambit_protocol::{Codec, JsonCodec};
use gambit_registry::{
    Authenticator, ConnectionRegistry, GuestAuthenticator, RegistryConfig,
};
use gambit_rules::ChessOracle;
use gambit_session::{
    Collaborators, EloRating, MemoryRecorder, RatingEngine, ResultRecorder,
    RulesOracle, SessionConfig, SessionManager,
};
use gambit_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::GambitError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The two
/// mutexes are distinct exclusion scopes: registry work never holds the
/// session lock and vice versa.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) registry: Mutex<ConnectionRegistry>,
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) registry_config: RegistryConfig,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Gambit server.
///
/// # Example
///
/// ```rust,ignore
/// use gambit::prelude::*;
///
/// let server = GambitServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(GuestAuthenticator)
///     .await?;
/// server.run().await
/// ```
pub struct GambitServerBuilder {
    bind_addr: String,
    registry_config: RegistryConfig,
    session_config: SessionConfig,
    oracle: Arc<dyn RulesOracle>,
    rating: Arc<dyn RatingEngine>,
    recorder: Arc<dyn ResultRecorder>,
}

impl GambitServerBuilder {
    /// Creates a new builder with default settings: standard chess
    /// rules, Elo rating, and an in-memory recorder.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            registry_config: RegistryConfig::default(),
            session_config: SessionConfig::default(),
            oracle: Arc::new(ChessOracle::new()),
            rating: Arc::new(EloRating::default()),
            recorder: Arc::new(MemoryRecorder::new()),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the connection liveness configuration.
    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Sets the session timing configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Replaces the rules oracle.
    pub fn oracle(mut self, oracle: Arc<dyn RulesOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Replaces the rating engine.
    pub fn rating(mut self, rating: Arc<dyn RatingEngine>) -> Self {
        self.rating = rating;
        self
    }

    /// Replaces the result recorder.
    pub fn recorder(mut self, recorder: Arc<dyn ResultRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Builds the server with the given authenticator.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport` as defaults.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<GambitServer<A, JsonCodec>, GambitError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let collab = Arc::new(Collaborators {
            oracle: self.oracle,
            rating: self.rating,
            recorder: self.recorder,
        });

        let state = Arc::new(ServerState {
            registry: Mutex::new(ConnectionRegistry::new(
                self.registry_config.clone(),
            )),
            sessions: Mutex::new(SessionManager::new(
                collab,
                self.session_config,
            )),
            registry_config: self.registry_config,
            auth,
            codec: JsonCodec,
        });

        Ok(GambitServer { transport, state })
    }
}

impl Default for GambitServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Gambit session server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GambitServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl<A, C> GambitServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> GambitServerBuilder {
        GambitServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop plus the background reaper.
    ///
    /// The reaper periodically force-closes connections that stopped
    /// heartbeating (routing each through the ordinary disconnect path)
    /// and removes finished or never-joined sessions. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), GambitError> {
        tracing::info!("Gambit server running");

        let reaper_state = Arc::clone(&self.state);
        let period = self.state.registry_config.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                run_reaper(&reaper_state).await;
            }
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// One reaper pass: sweep silent connections, then reap dead sessions.
async fn run_reaper<A: Authenticator, C: Codec>(state: &Arc<ServerState<A, C>>) {
    let kicked = state.registry.lock().await.sweep_stale();
    for identity in kicked {
        let mut sessions = state.sessions.lock().await;
        let _ = sessions.disconnect(&identity).await;
    }
    state.sessions.lock().await.reap().await;
}
