//! Matchmaker actor.
//!
//! A single `tokio` task owning the queue table and rating table
//! outright, driven by a periodic pairing-pass tick plus a command
//! channel for enqueue/dequeue/status calls — the same owning-task
//! shape as [`crate::match_actor`], generalized from "one match" to
//! "one matchmaker for the whole process" (spec.md §5 "the matchmaker
//! is itself a single task; the rating table and queues live nowhere
//! else").

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};

use crate::config::ArenaConfig;
use crate::core::PlayerId;
use crate::error::{GameError, GameResult};
use crate::matchmaking::matcher::{run_pairing_pass, MatchFound};
use crate::matchmaking::queue::{QueueEntry, QueueStatus, QueueTable};
use crate::matchmaking::rating::RatingTable;

/// Players-per-match the pairing pass groups toward. Every mode this
/// server runs is 1v1 (spec.md §3 glossary "Mode: matchmaking pool
/// identifier; this deployment runs 1v1 only").
const PLAYERS_PER_MATCH: usize = 2;

enum Command {
    Enqueue {
        player_id: PlayerId,
        mode: String,
        region: String,
        latency_ms: u32,
        reply: oneshot::Sender<GameResult<()>>,
    },
    Dequeue {
        player_id: PlayerId,
    },
    Status {
        player_id: PlayerId,
        reply: oneshot::Sender<QueueStatus>,
    },
    Rating {
        player_id: PlayerId,
        reply: oneshot::Sender<f64>,
    },
    RecordResult {
        winner: PlayerId,
        loser: PlayerId,
    },
}

/// Event the matchmaker emits out of its pairing pass for the server
/// to act on (spin up a match, notify a client a queue entry expired).
#[derive(Clone, Debug)]
pub enum MatchmakerEvent {
    /// A pairing was formed; the server should create a match and
    /// notify every listed player.
    Found(MatchFound),
    /// A queue entry aged out past `queue_timeout` without pairing.
    Expired(QueueEntry),
}

/// Cheap, cloneable handle to the running matchmaker actor.
#[derive(Clone)]
pub struct MatchmakerHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl MatchmakerHandle {
    /// Join the queue for `mode`/`region` (spec.md §4.10 `enqueue`).
    /// Rejects a player already queued anywhere.
    pub async fn enqueue(&self, player_id: PlayerId, mode: String, region: String, latency_ms: u32) -> GameResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Enqueue { player_id, mode, region, latency_ms, reply }).await?;
        rx.await.map_err(|_| actor_gone())?
    }

    /// Leave the queue (spec.md §4.10 `dequeue`). Best-effort no-op if
    /// the player wasn't queued.
    pub async fn dequeue(&self, player_id: PlayerId) {
        let _ = self.cmd_tx.send(Command::Dequeue { player_id }).await;
    }

    /// Current queue status for a player.
    pub async fn status(&self, player_id: PlayerId) -> GameResult<QueueStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { player_id, reply }).await?;
        rx.await.map_err(|_| actor_gone())
    }

    /// Current (decay-applied) skill rating for a player.
    pub async fn rating(&self, player_id: PlayerId) -> GameResult<f64> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Rating { player_id, reply }).await?;
        rx.await.map_err(|_| actor_gone())
    }

    /// Report a finished match's outcome so the rating table updates
    /// (spec.md §4.10, fed by the match actor's win-check step).
    pub async fn record_result(&self, winner: PlayerId, loser: PlayerId) {
        let _ = self.cmd_tx.send(Command::RecordResult { winner, loser }).await;
    }

    async fn send(&self, cmd: Command) -> GameResult<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| actor_gone())
    }
}

fn actor_gone() -> GameError {
    GameError::Fatal("matchmaker_unavailable".into())
}

/// Spawn the matchmaker actor. `events` receives every [`MatchmakerEvent`]
/// produced by pairing passes and queue-timeout sweeps; the caller
/// (normally [`crate::registry::MatchRegistry`]) drains it to create
/// matches and notify players.
pub fn spawn(config: Arc<ArenaConfig>) -> (MatchmakerHandle, mpsc::Receiver<MatchmakerEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let (event_tx, event_rx) = mpsc::channel(256);

    let actor = MatchmakerActor {
        config,
        queue: QueueTable::new(),
        ratings: RatingTable::new(),
        cmd_rx,
        event_tx,
    };

    tokio::spawn(actor.run());

    (MatchmakerHandle { cmd_tx }, event_rx)
}

struct MatchmakerActor {
    config: Arc<ArenaConfig>,
    queue: QueueTable,
    ratings: RatingTable,
    cmd_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<MatchmakerEvent>,
}

impl MatchmakerActor {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.matchmaker_tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            tracing::debug!("matchmaker actor closing: no handles remain");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.run_pass().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue { player_id, mode, region, latency_ms, reply } => {
                let now = now_ms();
                let rating = self.ratings.snapshot(&player_id, now);
                let entry = QueueEntry { player_id, rating, latency_ms, mode, region, joined_at_ms: now };
                let result = if self.queue.enqueue(entry) {
                    Ok(())
                } else {
                    Err(GameError::Precondition("already_queued".into()))
                };
                let _ = reply.send(result);
            }
            Command::Dequeue { player_id } => {
                self.queue.dequeue(&player_id);
            }
            Command::Status { player_id, reply } => {
                let _ = reply.send(self.queue.status(&player_id, now_ms()));
            }
            Command::Rating { player_id, reply } => {
                let _ = reply.send(self.ratings.snapshot(&player_id, now_ms()));
            }
            Command::RecordResult { winner, loser } => {
                self.ratings.record_result(&winner, &loser, now_ms());
            }
        }
    }

    async fn run_pass(&mut self) {
        let now = now_ms();

        let expired = self.queue.evict_expired(now, self.config.queue_timeout.as_millis() as u64);
        for entry in expired {
            tracing::info!(player_id = %entry.player_id, "queue entry expired");
            if self.event_tx.send(MatchmakerEvent::Expired(entry)).await.is_err() {
                return;
            }
        }

        let found = run_pairing_pass(
            &mut self.queue,
            now,
            self.config.base_skill_tol,
            self.config.max_skill_tol,
            self.config.latency_tol_ms,
            PLAYERS_PER_MATCH,
        );

        for pairing in found {
            tracing::info!(mode = %pairing.mode, players = pairing.players.len(), "match found");
            if self.event_tx.send(MatchmakerEvent::Found(pairing)).await.is_err() {
                return;
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_config() -> Arc<ArenaConfig> {
        let mut cfg = ArenaConfig::default();
        cfg.matchmaker_tick = StdDuration::from_millis(20);
        cfg.queue_timeout = StdDuration::from_millis(100);
        Arc::new(cfg)
    }

    #[tokio::test]
    async fn enqueue_then_status_reports_queued() {
        let (handle, _events) = spawn(test_config());
        handle.enqueue(PlayerId::new("a"), "1v1".into(), "na_east".into(), 40).await.unwrap();
        let status = handle.status(PlayerId::new("a")).await.unwrap();
        assert!(matches!(status, QueueStatus::Queued { .. }));
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let (handle, _events) = spawn(test_config());
        handle.enqueue(PlayerId::new("a"), "1v1".into(), "na_east".into(), 40).await.unwrap();
        let err = handle.enqueue(PlayerId::new("a"), "1v1".into(), "na_east".into(), 40).await.unwrap_err();
        assert_eq!(err, GameError::Precondition("already_queued".into()));
    }

    #[tokio::test]
    async fn two_compatible_players_produce_a_found_event() {
        let (handle, mut events) = spawn(test_config());
        handle.enqueue(PlayerId::new("a"), "1v1".into(), "na_east".into(), 40).await.unwrap();
        handle.enqueue(PlayerId::new("b"), "1v1".into(), "na_east".into(), 40).await.unwrap();

        let event = tokio::time::timeout(StdDuration::from_secs(1), events.recv()).await.unwrap().unwrap();
        assert!(matches!(event, MatchmakerEvent::Found(_)));
    }

    #[tokio::test]
    async fn record_result_updates_rating() {
        let (handle, _events) = spawn(test_config());
        let before = handle.rating(PlayerId::new("a")).await.unwrap();
        handle.record_result(PlayerId::new("a"), PlayerId::new("b")).await;
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        let after = handle.rating(PlayerId::new("a")).await.unwrap();
        assert!(after > before);
    }
}
