//! Per-connection session.
//!
//! One `ClientSession` per WebSocket connection: tracks which player or
//! spectator identity this socket has claimed, translates incoming
//! [`ClientMessage`]s into calls against the registry/matchmaker/
//! spectator layer, and relays whatever match frames that identity is
//! subscribed to back out over its sender channel. Grounded on the
//! teacher's per-session state machine in this file (`SessionState`,
//! player/connection bookkeeping); generalized from the teacher's
//! single long-lived match session object into the thinner per-socket
//! dispatcher spec.md §5's "one task per long-lived network connection"
//! calls for, since match lifetime here is owned by `match_actor`
//! rather than by the connection.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, RwLock};

use crate::core::{MatchId, PlayerId, SpectatorId};
use crate::error::GameError;
use crate::matchmaking::{MatchmakerHandle, QueueStatus};
use crate::network::protocol::{ClientMessage, MatchRole, ServerMessage};
use crate::registry::MatchRegistry;
use crate::spectator::SpectatorRegistry;

/// Shared table the matchmaker-event consumer uses to push
/// `match_found`/`queue_expired` notifications to a still-queued
/// connection out-of-band from its own request/reply cycle.
pub type NotifyTable = Arc<RwLock<BTreeMap<PlayerId, mpsc::Sender<ServerMessage>>>>;

/// What a connection currently identifies as. A socket starts out with
/// neither and claims one the first time it successfully joins a
/// match, queues, or spectates.
#[derive(Default)]
struct Identity {
    player_id: Option<PlayerId>,
    spectator: Option<(MatchId, SpectatorId)>,
}

/// Per-connection session state and message dispatch.
pub struct ClientSession {
    registry: Arc<MatchRegistry>,
    spectators: Arc<SpectatorRegistry>,
    matchmaker: Option<MatchmakerHandle>,
    max_spectators: usize,
    max_snapshots: usize,
    retention: std::time::Duration,
    snapshot_interval: std::time::Duration,
    identity: Identity,
    notify: NotifyTable,
    out: mpsc::Sender<ServerMessage>,
    /// Latest `server_ts - client_ts` skew from a `ping`, used as a
    /// rough latency estimate for `queue_join` (the wire message itself
    /// carries no latency field; see `DESIGN.md`).
    last_latency_ms: u32,
}

impl ClientSession {
    /// Construct a session for a freshly accepted connection.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<MatchRegistry>,
        spectators: Arc<SpectatorRegistry>,
        matchmaker: Option<MatchmakerHandle>,
        max_spectators: usize,
        max_snapshots: usize,
        retention: std::time::Duration,
        snapshot_interval: std::time::Duration,
        notify: NotifyTable,
        out: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            registry,
            spectators,
            matchmaker,
            max_spectators,
            max_snapshots,
            retention,
            snapshot_interval,
            identity: Identity::default(),
            notify,
            out,
            last_latency_ms: 0,
        }
    }

    /// Handle one incoming client message, replying on `self.out` as
    /// appropriate. Never panics on malformed application-level
    /// requests — those come back as an `error` reply or, for `input`,
    /// are silently dropped per spec.md §7.
    pub async fn handle(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::JoinMatch { match_id, player_id } => self.handle_join_match(match_id, player_id).await,
            ClientMessage::Input { player_id, action, params, client_ts: _ } => {
                self.handle_input(player_id, action, params).await
            }
            ClientMessage::Spectate { match_id } => self.handle_spectate(match_id).await,
            ClientMessage::Ping { ts } => self.handle_ping(ts).await,
            ClientMessage::QueueJoin { player_id, mode, region } => {
                self.handle_queue_join(player_id, mode, region).await
            }
            ClientMessage::QueueLeave { player_id } => self.handle_queue_leave(player_id).await,
        }
    }

    async fn handle_join_match(&mut self, match_id: MatchId, player_id: PlayerId) {
        let Some(handle) = self.registry.get(&match_id).await else {
            self.reply(ServerMessage::error(GameError::NotFound("match".into()).reason())).await;
            return;
        };

        let spawn_bounds_player = crate::game::player::Player::new(
            player_id.clone(),
            crate::core::Vec2::default(),
            crate::game::weapon::WeaponType::Melee,
            now_ms(),
        );

        match handle.join(spawn_bounds_player).await {
            Ok(()) => {
                self.registry.register_player(player_id.clone(), match_id).await;
                self.identity.player_id = Some(player_id);
                self.reply(ServerMessage::Joined { match_id }).await;
                if let Ok(sub) = handle.subscribe().await {
                    tokio::spawn(forward_frames(match_id, sub, self.out.clone()));
                }
            }
            Err(err) => self.reply(ServerMessage::error(err.reason())).await,
        }
    }

    async fn handle_input(&mut self, player_id: PlayerId, action: crate::network::protocol::ActionKind, params: crate::network::protocol::ActionParams) {
        let Some(handle) = self.registry.get_for_player(&player_id).await else {
            // spec.md §7: invalid input is logged and dropped silently.
            tracing::debug!(player_id = %player_id, "input for player not in any match, dropping");
            return;
        };
        let input = params.into_player_input(action);
        if let Err(err) = handle.submit_input(player_id.clone(), input).await {
            tracing::debug!(player_id = %player_id, error = %err, "dropping input");
        }
    }

    async fn handle_spectate(&mut self, match_id: MatchId) {
        let Some(handle) = self.registry.get(&match_id).await else {
            self.reply(ServerMessage::error(GameError::NotFound("match".into()).reason())).await;
            return;
        };

        let snapshots = match handle.subscribe_snapshots().await {
            Ok(sub) => sub,
            Err(err) => {
                self.reply(ServerMessage::error(err.reason())).await;
                return;
            }
        };
        let room = self
            .spectators
            .get_or_create(match_id, self.max_spectators, self.max_snapshots, self.retention, self.snapshot_interval, snapshots)
            .await;

        match room.join().await {
            Ok(spectator_id) => {
                self.identity.spectator = Some((match_id, spectator_id));
                self.reply(ServerMessage::Welcome { spectator_id, match_id }).await;
                self.reply(ServerMessage::MatchFound { match_id, role: MatchRole::Spectator }).await;
                if let Ok(sub) = handle.subscribe().await {
                    tokio::spawn(forward_frames(match_id, sub, self.out.clone()));
                }
            }
            Err(err) => self.reply(ServerMessage::error(err.reason())).await,
        }
    }

    async fn handle_ping(&mut self, ts: u64) {
        let server_ts = now_ms();
        self.last_latency_ms = server_ts.saturating_sub(ts).min(u32::MAX as u64) as u32;
        self.reply(ServerMessage::Pong { ts, server_ts }).await;
    }

    async fn handle_queue_join(&mut self, player_id: PlayerId, mode: String, region: String) {
        let Some(matchmaker) = &self.matchmaker else {
            self.reply(ServerMessage::error("temporarily_unavailable")).await;
            return;
        };
        match matchmaker.enqueue(player_id.clone(), mode, region, self.last_latency_ms).await {
            Ok(()) => {
                self.identity.player_id = Some(player_id.clone());
                self.notify.write().await.insert(player_id.clone(), self.out.clone());
                let position = match matchmaker.status(player_id).await {
                    Ok(QueueStatus::Queued { position, .. }) => position,
                    _ => 0,
                };
                self.reply(ServerMessage::Queued { position }).await;
            }
            Err(err) => self.reply(ServerMessage::error(err.reason())).await,
        }
    }

    async fn handle_queue_leave(&mut self, player_id: PlayerId) {
        if let Some(matchmaker) = &self.matchmaker {
            matchmaker.dequeue(player_id).await;
        }
        self.reply(ServerMessage::Left).await;
    }

    /// Release whatever this connection was holding on disconnect:
    /// leave its match, leave the queue, leave its spectator room.
    pub async fn disconnect(&mut self) {
        if let Some(player_id) = self.identity.player_id.take() {
            if let Some(handle) = self.registry.get_for_player(&player_id).await {
                handle.leave(player_id.clone()).await;
            }
            self.registry.unregister_player(&player_id).await;
            if let Some(matchmaker) = &self.matchmaker {
                matchmaker.dequeue(player_id).await;
            }
        }
        if let Some((match_id, spectator_id)) = self.identity.spectator.take() {
            if let Some(room) = self.spectators.get(&match_id).await {
                room.leave(&spectator_id).await;
            }
        }
    }

    async fn reply(&self, msg: ServerMessage) {
        let _ = self.out.send(msg).await;
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Drain a match's broadcast frames and relay them to one connection
/// as `state_full`/`state_delta` messages, until the broadcaster or
/// the connection's sender closes.
async fn forward_frames(match_id: MatchId, mut subscription: crate::broadcast::Subscription, out: mpsc::Sender<ServerMessage>) {
    use crate::broadcast::Frame;
    use tokio::sync::broadcast::error::RecvError;

    loop {
        let frame = match subscription.recv().await {
            Ok(frame) => frame,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };

        let decoded: Frame = if frame.compressed {
            use std::io::Read;
            let mut decoder = flate2::read::GzDecoder::new(frame.bytes.as_slice());
            let mut buf = Vec::new();
            if decoder.read_to_end(&mut buf).is_err() {
                continue;
            }
            match serde_json::from_slice(&buf) {
                Ok(f) => f,
                Err(_) => continue,
            }
        } else {
            match serde_json::from_slice(&frame.bytes) {
                Ok(f) => f,
                Err(_) => continue,
            }
        };

        let ts = now_ms();
        let msg = match decoded {
            Frame::FullState(snapshot) => ServerMessage::StateFull {
                match_id,
                tick: snapshot.tick,
                ts,
                snapshot: serde_json::to_value(&snapshot).unwrap_or(serde_json::Value::Null),
            },
            Frame::Delta(batch) => ServerMessage::StateDelta {
                match_id,
                tick: batch.tick,
                ts,
                deltas: serde_json::to_value(&batch).unwrap_or(serde_json::Value::Null),
                compressed: false,
            },
        };

        if out.send(msg).await.is_err() {
            break;
        }
    }
}
