//! WebSocket gateway binding client connections to game instances.
//!
//! A connection moves through `Pending -> Bound -> Closed`, or is rejected
//! before the upgrade. The upgrade handler checks joinability synchronously
//! and answers `403 Forbidden` without upgrading; accepted connections are
//! bound to their instance when the socket opens and unbound when it closes.
//! One task drives each connection, so its events never overlap.

use crate::connection::{Binding, ClientConnection, ConnectionHandle, Outbound};
use crate::pool::{SharedPool, SlotId};
use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Maps a raw `gameID` query value onto a valid slot.
///
/// Anything that is not an integer in `0..max_games` becomes slot `0`.
pub fn resolve_slot(raw: Option<&str>, max_games: usize) -> SlotId {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|&id| id >= 0)
        .and_then(|id| usize::try_from(id).ok())
        .filter(|&id| id < max_games)
        .unwrap_or(0)
}

/// Connection-side operations on the shared pool.
pub struct Gateway {
    pool: SharedPool,
    max_games: usize,
    idle_timeout: Option<Duration>,
    next_id: AtomicUsize,
}

impl Gateway {
    pub fn new(pool: SharedPool, max_games: usize, idle_timeout: Option<Duration>) -> Self {
        Self {
            pool,
            max_games,
            idle_timeout,
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn resolve_slot(&self, raw: Option<&str>) -> SlotId {
        resolve_slot(raw, self.max_games)
    }

    /// Whether an upgrade for `game_id` should be accepted.
    pub async fn admit(&self, game_id: SlotId) -> bool {
        self.pool.lock().await.is_joinable(game_id)
    }

    /// Creates the pending state for an accepted upgrade.
    pub fn connect(
        &self,
        game_id: SlotId,
        remote_addr: SocketAddr,
    ) -> (ClientConnection, mpsc::UnboundedReceiver<Outbound>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, outbound) = ConnectionHandle::new(id, remote_addr);
        (ClientConnection::new(game_id, handle), outbound)
    }

    /// Binds `connection` to its instance.
    ///
    /// Returns `false` when the slot was retired between upgrade and open;
    /// the connection then stays unbound.
    pub async fn open(&self, connection: &mut ClientConnection) -> bool {
        let mut pool = self.pool.lock().await;
        let Some(slot) = pool.get_mut(connection.game_id) else {
            debug!(
                game = connection.game_id,
                connection = connection.handle.id(),
                "game vanished before the socket opened"
            );
            return false;
        };

        let player = slot.bind(connection.handle.clone());
        connection.binding = Some(Binding {
            player,
            generation: slot.generation(),
        });
        info!(
            game = connection.game_id,
            %player,
            remote = %connection.remote_addr(),
            "👋 Player joined"
        );
        true
    }

    /// Hands one inbound payload to the bound instance.
    pub async fn message(&self, connection: &ClientConnection, data: &[u8]) {
        let Some(binding) = connection.binding else {
            return;
        };

        let mut pool = self.pool.lock().await;
        let Some(slot) = pool
            .get_mut(connection.game_id)
            .filter(|slot| slot.generation() == binding.generation)
        else {
            return;
        };

        if let Err(e) = slot.instance_mut().handle_message(binding.player, data) {
            warn!(
                game = connection.game_id,
                player = %binding.player,
                error = %e,
                "game rejected client message"
            );
        }
    }

    /// Unbinds `connection` from its instance, if it is still there.
    pub async fn close(&self, connection: ClientConnection) {
        let Some(binding) = connection.binding else {
            debug!(connection = connection.handle.id(), "unbound connection closed");
            return;
        };

        let mut pool = self.pool.lock().await;
        match pool.get_mut(connection.game_id) {
            Some(slot) if slot.generation() == binding.generation => {
                slot.unbind(connection.handle.id(), binding.player);
                info!(
                    game = connection.game_id,
                    player = %binding.player,
                    session = ?connection.connected_for(),
                    "👋 Player left"
                );
            }
            _ => debug!(
                game = connection.game_id,
                player = %binding.player,
                "player left a retired game"
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlayQuery {
    #[serde(rename = "gameID")]
    game_id: Option<String>,
}

/// `GET /play?gameID=<n>`
pub async fn play_handler(
    State(state): State<AppState>,
    Query(query): Query<PlayQuery>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let gateway = state.gateway;
    let game_id = gateway.resolve_slot(query.game_id.as_deref());

    if !gateway.admit(game_id).await {
        debug!(game = game_id, remote = %remote_addr, "rejecting upgrade for closed game");
        return (StatusCode::FORBIDDEN, "403 Forbidden").into_response();
    }

    ws.on_upgrade(move |socket| async move {
        let (connection, outbound) = gateway.connect(game_id, remote_addr);
        run_session(gateway, socket, connection, outbound).await;
    })
}

enum Inbound {
    Frame(Message),
    Closed,
}

async fn next_inbound(socket: &mut WebSocket) -> Inbound {
    match socket.recv().await {
        Some(Ok(Message::Close(_))) | None => Inbound::Closed,
        Some(Ok(message)) => Inbound::Frame(message),
        Some(Err(e)) => {
            debug!(error = %e, "websocket read failed");
            Inbound::Closed
        }
    }
}

/// Resolves once `deadline` passes; never when there is none.
async fn idle_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_session(
    gateway: Arc<Gateway>,
    mut socket: WebSocket,
    mut connection: ClientConnection,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    if !gateway.open(&mut connection).await {
        gateway.close(connection).await;
        return;
    }

    // Only client traffic counts as activity; frames sent to the client do not.
    let mut last_inbound = Instant::now();

    loop {
        let deadline = gateway.idle_timeout.map(|limit| last_inbound + limit);

        tokio::select! {
            inbound = next_inbound(&mut socket) => {
                last_inbound = Instant::now();
                match inbound {
                    Inbound::Frame(Message::Binary(data)) => gateway.message(&connection, &data).await,
                    Inbound::Frame(Message::Text(text)) => {
                        gateway.message(&connection, text.as_str().as_bytes()).await
                    }
                    Inbound::Frame(_) => {}
                    Inbound::Closed => break,
                }
            }
            command = outbound.recv() => match command {
                Some(Outbound::Frame(data)) => {
                    if socket.send(Message::Binary(data.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Terminate) | None => break,
            },
            _ = idle_deadline(deadline) => {
                debug!(connection = connection.handle.id(), "idle timeout");
                break;
            }
        }
    }

    gateway.close(connection).await;
}
