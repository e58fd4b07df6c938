//! WebSocket game server.
//!
//! Async accept loop plus a per-connection task per live socket, in
//! the teacher's shape: one task reads the socket and dispatches
//! messages, a second drains an `mpsc::Receiver<ServerMessage>` and
//! writes them out, and a background task reacts to matchmaker events.
//! Grounded on `GameServer::run`/`handle_connection` in this same file;
//! auth/session-bookkeeping is replaced with the registry/matchmaker/
//! spectator layer this spec describes (spec.md §6).

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ArenaConfig;
use crate::core::{PlayerId, WorldBounds};
use crate::game::player::Player;
use crate::matchmaking::{self, MatchmakerEvent, MatchmakerHandle};
use crate::network::protocol::{ClientMessage, MatchRole, ServerMessage};
use crate::network::session::ClientSession;
use crate::registry::MatchRegistry;
use crate::spectator::SpectatorRegistry;

/// Server-facing configuration, distinct from [`ArenaConfig`] (which
/// governs simulation tunables); mirrors the teacher's `ServerConfig`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Idle connection timeout (currently advisory; enforced by the
    /// per-connection read loop's lack of activity, not a separate
    /// reaper).
    pub connection_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_connections: 1000,
            connection_timeout: Duration::from_secs(30),
        }
    }
}

/// Errors the server's top-level `run` loop can fail with.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind the listener socket.
    #[error("failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// A WebSocket-level protocol error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached; the caller should back off.
    #[error("connection limit reached")]
    ConnectionLimitReached,
}

/// The arena's WebSocket front end.
pub struct GameServer {
    config: ServerConfig,
    arena_config: Arc<ArenaConfig>,
    registry: Arc<MatchRegistry>,
    spectators: Arc<SpectatorRegistry>,
    matchmaker: Option<MatchmakerHandle>,
    matchmaker_events: tokio::sync::Mutex<Option<mpsc::Receiver<MatchmakerEvent>>>,
    clients: Arc<RwLock<BTreeSet<SocketAddr>>>,
    notify: Arc<RwLock<std::collections::BTreeMap<PlayerId, mpsc::Sender<ServerMessage>>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Construct a server with its own matchmaker and registry. Call
    /// [`GameServer::run`] to start serving.
    pub fn new(config: ServerConfig, arena_config: Arc<ArenaConfig>) -> Self {
        let (matchmaker, matchmaker_events) = matchmaking::spawn(arena_config.clone());
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            registry: Arc::new(MatchRegistry::new(arena_config.clone(), Some(matchmaker.clone()))),
            spectators: Arc::new(SpectatorRegistry::new()),
            matchmaker: Some(matchmaker),
            matchmaker_events: tokio::sync::Mutex::new(Some(matchmaker_events)),
            config,
            arena_config,
            clients: Arc::new(RwLock::new(BTreeSet::new())),
            notify: Arc::new(RwLock::new(std::collections::BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run the accept loop until a shutdown signal is observed.
    /// Returns cleanly on graceful shutdown; spec.md §6 exit code `0`.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "arena server listening");

        if let Some(events) = self.matchmaker_events.lock().await.take() {
            let registry = self.registry.clone();
            let arena_config = self.arena_config.clone();
            let notify = self.notify.clone();
            tokio::spawn(run_matchmaker_consumer(events, registry, arena_config, notify));
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.clients.read().await.len() >= self.config.max_connections {
                                warn!(%addr, "connection limit reached, rejecting");
                                continue;
                            }
                            self.handle_connection(stream, addr);
                        }
                        Err(err) => error!(%err, "accept error"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Signal every connection and the accept loop to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Current connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let registry = self.registry.clone();
        let spectators = self.spectators.clone();
        let matchmaker = self.matchmaker.clone();
        let arena_config = self.arena_config.clone();
        let notify = self.notify.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(err) => {
                    error!(%addr, %err, "websocket handshake failed");
                    return;
                }
            };

            clients.write().await.insert(addr);

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(err) => {
                            error!(%err, "failed to serialize outgoing message");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut session = ClientSession::new(
                registry,
                spectators,
                matchmaker,
                arena_config.max_spectators,
                arena_config.max_snapshots,
                arena_config.retention,
                arena_config.snapshot_interval,
                notify.clone(),
                msg_tx.clone(),
            );

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => session.handle(client_msg).await,
                                    Err(err) => debug!(%addr, %err, "invalid message"),
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                if let Ok(client_msg) = ClientMessage::from_bytes(&data) {
                                    session.handle(client_msg).await;
                                }
                            }
                            Some(Ok(Message::Ping(_))) => {}
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(%addr, "client disconnected");
                                break;
                            }
                            Some(Err(err)) => {
                                error!(%addr, %err, "websocket error");
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown { reason: "server shutting down".into() }).await;
                        break;
                    }
                }
            }

            session.disconnect().await;
            sender_task.abort();
            clients.write().await.remove(&addr);
            let mut registry_notify = notify.write().await;
            registry_notify.retain(|_, tx| !tx.is_closed());
        });
    }
}

/// Background task: react to pairings/expirations the matchmaker
/// produces by materializing matches and notifying the players
/// involved (spec.md §4.10 "the matchmaker requests match creation").
async fn run_matchmaker_consumer(
    mut events: mpsc::Receiver<MatchmakerEvent>,
    registry: Arc<MatchRegistry>,
    arena_config: Arc<ArenaConfig>,
    notify: Arc<RwLock<std::collections::BTreeMap<PlayerId, mpsc::Sender<ServerMessage>>>>,
) {
    let bounds = WorldBounds::new(arena_config.world_width, arena_config.world_height);

    while let Some(event) = events.recv().await {
        match event {
            MatchmakerEvent::Found(pairing) => {
                let handle = registry.create_match(bounds, None, None).await;
                for entry in &pairing.players {
                    let mut rng = crate::core::MatchRng::new();
                    let spawn_pos = bounds.random_spawn(20.0, rng.rng());
                    let mut player = Player::new(entry.player_id.clone(), spawn_pos, crate::game::weapon::WeaponType::Rifle, 0);
                    player.skill_rating = entry.rating;
                    if handle.join(player).await.is_err() {
                        continue;
                    }
                    registry.register_player(entry.player_id.clone(), *handle.id()).await;

                    if let Some(sender) = notify.read().await.get(&entry.player_id) {
                        let _ = sender
                            .send(ServerMessage::MatchFound { match_id: *handle.id(), role: MatchRole::Player })
                            .await;
                    }
                }
                info!(match_id = %handle.id(), "match created from pairing");
            }
            MatchmakerEvent::Expired(entry) => {
                if let Some(sender) = notify.read().await.get(&entry.player_id) {
                    let _ = sender.send(ServerMessage::error("queue_expired")).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_all_interfaces() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.max_connections, 1000);
    }
}
