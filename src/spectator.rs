//! Spectator fan-out and replay recording.
//!
//! One `SpectatorRoom` per match: caps how many spectators can watch at
//! once, and owns the match's [`ReplayRing`] so a late joiner can ask
//! "what did this look like a few seconds ago" without the match actor
//! itself needing to know spectators exist. Grounded on the teacher's
//! `SessionManager`/`MatchSession` player bookkeeping in
//! `network/session.rs` (a capacity-checked id set plus a background
//! task draining a broadcast receiver), generalized to the non-playing
//! observer role spec.md §4.8/§4.9 describe — the teacher has no
//! spectator concept at all.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use crate::broadcast::{FullStateSnapshot, SnapshotSubscription};
use crate::core::{MatchId, SpectatorId};
use crate::error::{GameError, GameResult};
use crate::replay::{ReplayRing, ReplayStats, Snapshot};

/// Per-match spectator set, capacity-gated, plus the replay history
/// for that match.
pub struct SpectatorRoom {
    match_id: MatchId,
    max_spectators: usize,
    spectators: RwLock<std::collections::BTreeSet<SpectatorId>>,
    ring: tokio::sync::Mutex<ReplayRing>,
}

impl SpectatorRoom {
    /// Construct a room for `match_id`, recording starting at `now_ms`.
    pub fn new(
        match_id: MatchId,
        max_spectators: usize,
        max_snapshots: usize,
        retention: std::time::Duration,
        snapshot_interval: std::time::Duration,
        now_ms: u64,
    ) -> Self {
        Self {
            match_id,
            max_spectators,
            spectators: RwLock::new(std::collections::BTreeSet::new()),
            ring: tokio::sync::Mutex::new(ReplayRing::new(max_snapshots, retention, snapshot_interval, now_ms)),
        }
    }

    /// Admit a new spectator (spec.md §4.8 `spectate`). Rejects once
    /// `max_spectators` is reached.
    pub async fn join(&self) -> GameResult<SpectatorId> {
        let mut spectators = self.spectators.write().await;
        if spectators.len() >= self.max_spectators {
            return Err(GameError::Capacity("spectators_full".into()));
        }
        let id = SpectatorId::generate();
        spectators.insert(id);
        Ok(id)
    }

    /// Remove a spectator. No-op if they weren't in the room.
    pub async fn leave(&self, id: &SpectatorId) {
        self.spectators.write().await.remove(id);
    }

    /// Current spectator count.
    pub async fn count(&self) -> usize {
        self.spectators.read().await.len()
    }

    /// Record one full-state snapshot into this room's replay ring.
    pub async fn record(&self, now_ms: u64, snapshot: &FullStateSnapshot) {
        self.ring.lock().await.record(now_ms, snapshot);
    }

    /// History at or after `from` (spec.md §4.9 `get_replay`).
    pub async fn get_replay(&self, from: Option<u64>) -> Vec<Snapshot> {
        self.ring.lock().await.get_replay(from)
    }

    /// Latest retained snapshot at or before `relative_ms`.
    pub async fn snapshot_at(&self, relative_ms: u64) -> Option<Snapshot> {
        self.ring.lock().await.snapshot_at(relative_ms).cloned()
    }

    /// Aggregate replay counters for admin inspection.
    pub async fn stats(&self, now_ms: u64) -> ReplayStats {
        self.ring.lock().await.stats(now_ms)
    }
}

/// Process-wide directory of spectator rooms, one per live match.
#[derive(Default)]
pub struct SpectatorRegistry {
    rooms: RwLock<BTreeMap<MatchId, Arc<SpectatorRoom>>>,
}

impl SpectatorRegistry {
    /// Construct an empty registry.
    pub fn new() -> Self {
        Self { rooms: RwLock::new(BTreeMap::new()) }
    }

    /// Get this match's room, creating it (and spawning its replay
    /// recorder against `snapshots`) on first access. The caller must
    /// have already subscribed to the match's per-tick snapshot
    /// stream; `snapshots` is discarded unused if another connection
    /// won the race to create the room first.
    pub async fn get_or_create(
        &self,
        match_id: MatchId,
        max_spectators: usize,
        max_snapshots: usize,
        retention: std::time::Duration,
        snapshot_interval: std::time::Duration,
        snapshots: SnapshotSubscription,
    ) -> Arc<SpectatorRoom> {
        if let Some(room) = self.rooms.read().await.get(&match_id).cloned() {
            return room;
        }

        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(&match_id).cloned() {
            return room;
        }

        let room = Arc::new(SpectatorRoom::new(
            match_id,
            max_spectators,
            max_snapshots,
            retention,
            snapshot_interval,
            now_ms(),
        ));
        rooms.insert(match_id, room.clone());
        tokio::spawn(record_frames(room.clone(), snapshots));
        room
    }

    /// Look up a match's room without creating one.
    pub async fn get(&self, match_id: &MatchId) -> Option<Arc<SpectatorRoom>> {
        self.rooms.read().await.get(match_id).cloned()
    }

    /// Drop a match's room once the match itself is gone.
    pub async fn remove(&self, match_id: &MatchId) {
        self.rooms.write().await.remove(match_id);
    }
}

/// Background task: drain `snapshots` and record each one into
/// `room`'s replay ring — one arrives per committed tick (spec.md
/// §4.8 "on every committed broadcast the room appends a timestamped
/// event to the replay ring"), regardless of the wire keyframe
/// cadence. Runs until the match's broadcaster is dropped (the match
/// actor stopped).
async fn record_frames(room: Arc<SpectatorRoom>, mut snapshots: SnapshotSubscription) {
    loop {
        match snapshots.recv().await {
            Ok(snapshot) => room.record(now_ms(), &snapshot).await,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
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

    fn test_room() -> SpectatorRoom {
        SpectatorRoom::new(MatchId::generate(), 2, 100, StdDuration::from_secs(1800), StdDuration::from_millis(100), 0)
    }

    #[tokio::test]
    async fn join_up_to_capacity_then_rejects() {
        let room = test_room();
        assert!(room.join().await.is_ok());
        assert!(room.join().await.is_ok());
        let err = room.join().await.unwrap_err();
        assert_eq!(err.reason(), "spectators_full");
    }

    #[tokio::test]
    async fn leave_frees_a_slot() {
        let room = test_room();
        let a = room.join().await.unwrap();
        room.join().await.unwrap();
        room.leave(&a).await;
        assert!(room.join().await.is_ok());
    }

    #[tokio::test]
    async fn record_and_replay_round_trip() {
        let room = test_room();
        let snapshot = FullStateSnapshot {
            tick: 1,
            status: crate::game::state::MatchStatus::Active,
            players: vec![],
            projectiles: vec![],
            power_ups: vec![],
        };
        room.record(0, &snapshot).await;
        assert_eq!(room.get_replay(None).await.len(), 1);
    }
}
