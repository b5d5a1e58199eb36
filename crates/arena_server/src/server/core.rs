//! Core game server implementation.
//!
//! `GameServer` owns the shared state, builds the router and runs the
//! listener, the tick loop and graceful shutdown.

use super::{api, AppState};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::{GameFactory, RelayGameFactory};
use crate::gateway::play_handler;
use crate::pool::SharedPool;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// The game server.
///
/// Holds the instance pool together with the matchmaking and gateway state
/// built on top of it. The simulation itself is supplied through a
/// [`GameFactory`].
pub struct GameServer {
    /// Server configuration settings
    config: ServerConfig,

    /// State handed to every route
    state: AppState,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl GameServer {
    /// Creates a server running the built-in relay game.
    pub fn new(config: ServerConfig) -> Self {
        let factory = Arc::new(RelayGameFactory::new(config.match_duration()));
        Self::with_factory(config, factory)
    }

    /// Creates a server whose instances come from `factory`.
    pub fn with_factory(config: ServerConfig, factory: Arc<dyn GameFactory>) -> Self {
        let state = AppState::new(&config, factory);
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            state,
            shutdown_sender,
        }
    }

    /// Builds the HTTP router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/site_info", get(api::site_info))
            .route("/api/user/profile", post(api::user_stub))
            .route("/api/user/get_pass", post(api::user_stub))
            .route("/api/find_game", post(api::find_game))
            .route("/play", get(play_handler))
            .route("/health", get(|| async { Json(json!({ "ok": true })) }))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting game server on {}", self.config.bind_address);
        let listener = bind_listener(self.config.bind_address)?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until shutdown.
    ///
    /// Slot 0 is filled before the first request so direct `/play` links
    /// work on a fresh server.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener has no address: {e}")))?;

        match self.state.pool.lock().await.create(None) {
            Ok(id) => info!("🎮 Game {} ready", id),
            Err(e) => warn!("No initial game created: {}", e),
        }

        if self.config.tick_interval_ms > 0 {
            self.start_server_tick();
            info!(
                "🕒 Server tick started with interval: {}ms",
                self.config.tick_interval_ms
            );
        } else {
            info!("⏸️ Server tick disabled (interval: 0ms)");
        }

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let pool = self.state.pool.clone();
        let shutdown_signal = async move {
            let _ = shutdown_receiver.recv().await;
            info!("Shutdown signal received");
            info!("🧹 Performing server cleanup...");
            pool.lock().await.shutdown();
        };

        info!("✅ Listening on {}", local_addr);
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServerError::Network(format!("Server failed: {e}")))?;

        info!("Server stopped");
        Ok(())
    }

    /// Advances every instance on a fixed interval and clears out the ones
    /// that stopped on their own.
    fn start_server_tick(&self) {
        let pool = self.state.pool.clone();
        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let tick_interval = Duration::from_millis(self.config.tick_interval_ms);

        tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_tick = Instant::now();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_receiver.recv() => break,
                }

                let now = Instant::now();
                let dt = now - last_tick;
                last_tick = now;

                let mut pool = pool.lock().await;
                pool.tick(dt);
                let reaped = pool.reap_stopped();
                if !reaped.is_empty() {
                    debug!(games = ?reaped, "reaped stopped games");
                }
            }
        });
    }

    /// Initiates server shutdown.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn pool(&self) -> SharedPool {
        self.state.pool.clone()
    }
}

/// Creates a listening socket with address reuse enabled.
fn bind_listener(address: SocketAddr) -> Result<TcpListener, ServerError> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
    if let Err(e) = socket.set_reuse_address(true) {
        warn!("Failed to set SO_REUSEADDR: {}", e);
    }

    socket
        .bind(&address.into())
        .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
    socket
        .listen(1024)
        .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;

    let std_listener: StdTcpListener = socket.into();
    std_listener
        .set_nonblocking(true)
        .map_err(|e| ServerError::Network(format!("Failed to set non-blocking: {e}")))?;

    TcpListener::from_std(std_listener)
        .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFactory;

    #[tokio::test]
    async fn new_server_starts_with_an_empty_pool() {
        let server = GameServer::new(ServerConfig::default());
        let pool = server.pool();
        let pool = pool.lock().await;
        assert_eq!(pool.max_games(), 5);
        assert_eq!(pool.slots().count(), 0);
    }

    #[tokio::test]
    async fn shutdown_without_start_is_harmless() {
        let server = GameServer::new(ServerConfig::default());
        assert!(server.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn bind_listener_picks_an_ephemeral_port() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn tick_reaps_games_that_stopped_themselves() {
        let factory = Arc::new(StubFactory::default());
        let config = ServerConfig {
            tick_interval_ms: 5,
            ..Default::default()
        };
        let server = GameServer::with_factory(config, factory.clone());
        server.pool().lock().await.create(None).unwrap();
        factory.latest(0).lock().unwrap().stopped = true;

        server.start_server_tick();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(server.pool().lock().await.get(0).is_none());
        assert!(factory.latest(0).lock().unwrap().ticks == 0);
        server.shutdown().await.unwrap();
    }
}
