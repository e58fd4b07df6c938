//! Match state.
//!
//! The authoritative per-match entity store: player/projectile/power-up
//! maps, status transitions, and the field-level diff bookkeeping that
//! feeds the delta queue. Grounded on the teacher's `MatchState`
//! (BTreeMap entity maps, `push_event`/`take_events` drain pattern) and
//! `game/events.rs`'s tagged `GameEventData` enum, generalized from the
//! teacher's battle-royale phase machine (`Waiting`/`Countdown`/
//! `Playing`/`Ended`) to spec.md §3's simpler `waiting`/`active`/
//! `finished` match lifecycle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::delta::{DeltaBatch, DeltaRecord, PlayerFieldChanges, ProjectileFieldChanges};
use super::player::Player;
use super::powerup::PowerUp;
use super::projectile::Projectile;
use crate::core::{MatchId, PlayerId, WorldBounds};
use crate::error::{GameError, GameResult};

/// Lifecycle phase of a match (spec.md §3 "Match").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Below `min_players`; simulation is paused.
    Waiting,
    /// Simulation running at `TICK_HZ`.
    Active,
    /// Terminal; no further ticks or joins are accepted.
    Finished,
}

/// The authoritative state of one match (spec.md §3 "Match").
///
/// Invariant: `players.len() <= max_players`; once `status` becomes
/// `Finished` it never reverts.
#[derive(Debug)]
pub struct Match {
    /// Server-generated match id.
    pub id: MatchId,
    /// Current lifecycle phase.
    pub status: MatchStatus,
    /// World bounds shared by every entity in this match.
    pub bounds: WorldBounds,
    /// Connected players, keyed by id.
    pub players: BTreeMap<PlayerId, Player>,
    /// Live projectiles, keyed by id.
    pub projectiles: BTreeMap<u64, Projectile>,
    /// Power-up pickups, keyed by id.
    pub power_ups: BTreeMap<u64, PowerUp>,
    /// Per-player score (kills, objective points, etc).
    pub scores: BTreeMap<PlayerId, u32>,
    /// Number of committed ticks since `Active`.
    pub tick_count: u64,
    /// When the match transitioned to `Active` (ms since process start).
    pub started_at: Option<u64>,
    /// Timestamp of the last committed tick.
    pub last_tick: u64,
    /// Score at which the match ends, if configured.
    pub score_limit: Option<u32>,
    /// Elapsed-time limit in ms, if configured.
    pub time_limit_ms: Option<u64>,
    min_players: usize,
    max_players: usize,
    next_projectile_id: u64,
    next_powerup_id: u64,
    pending_player_changes: BTreeMap<PlayerId, PlayerFieldChanges>,
    pending_projectile_changes: BTreeMap<u64, ProjectileFieldChanges>,
    delta_queue: Vec<DeltaRecord>,
}

impl Match {
    /// Construct a new, empty match in `Waiting` status.
    pub fn new(
        id: MatchId,
        bounds: WorldBounds,
        min_players: usize,
        max_players: usize,
        score_limit: Option<u32>,
        time_limit_ms: Option<u64>,
    ) -> Self {
        Self {
            id,
            status: MatchStatus::Waiting,
            bounds,
            players: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            power_ups: BTreeMap::new(),
            scores: BTreeMap::new(),
            tick_count: 0,
            started_at: None,
            last_tick: 0,
            score_limit,
            time_limit_ms,
            min_players,
            max_players,
            next_projectile_id: 0,
            next_powerup_id: 0,
            pending_player_changes: BTreeMap::new(),
            pending_projectile_changes: BTreeMap::new(),
            delta_queue: Vec::new(),
        }
    }

    /// Join a player, enforcing capacity, duplicate-join, and
    /// terminal-state rejection (spec.md §4.6/§7: `game_full`,
    /// `already_joined`, `match_finished`).
    pub fn join(&mut self, player: Player) -> GameResult<()> {
        if self.status == MatchStatus::Finished {
            return Err(GameError::State("match_finished".into()));
        }
        if self.players.contains_key(&player.id) {
            return Err(GameError::AlreadyJoined);
        }
        if self.players.len() >= self.max_players {
            return Err(GameError::Capacity("game_full".into()));
        }
        let id = player.id.clone();
        self.delta_queue.push(DeltaRecord::PlayerJoined {
            player_id: id.clone(),
            player: player.clone(),
        });
        self.players.insert(id, player);
        Ok(())
    }

    /// Remove a player (disconnect or explicit leave).
    pub fn leave(&mut self, id: &PlayerId) {
        if self.players.remove(id).is_some() {
            self.pending_player_changes.remove(id);
            self.delta_queue.push(DeltaRecord::PlayerLeft { player_id: id.clone() });
        }
    }

    /// Apply a partial set of field changes to a player, both mutating
    /// the live struct and recording the diff for the next commit
    /// (spec.md §9 "explicit setter helpers record the diff at mutation
    /// time"; later writes to the same field in one tick win, via
    /// `PlayerFieldChanges::merge`).
    pub fn apply_player_changes(&mut self, id: &PlayerId, changes: PlayerFieldChanges) {
        let Some(player) = self.players.get_mut(id) else {
            return;
        };
        if let Some(v) = changes.position {
            player.position = v;
        }
        if let Some(v) = changes.velocity {
            player.velocity = v;
        }
        if let Some(v) = changes.health {
            player.health = v;
            player.alive = v > 0;
        }
        if let Some(v) = changes.alive {
            player.alive = v;
        }
        if let Some(v) = changes.mana {
            player.mana = v;
        }
        if let Some(v) = changes.stamina {
            player.stamina = v;
        }
        if let Some(v) = changes.blocking_until {
            player.status.blocking_until = v;
        }
        if let Some(v) = changes.invulnerable_until {
            player.status.invulnerable_until = v;
        }
        if let Some(v) = changes.casting_until {
            player.status.casting_until = v;
        }
        self.pending_player_changes.entry(id.clone()).or_default().merge(changes);
    }

    /// Apply a partial set of field changes to a projectile.
    pub fn apply_projectile_changes(&mut self, id: u64, changes: ProjectileFieldChanges) {
        let Some(projectile) = self.projectiles.get_mut(&id) else {
            return;
        };
        if let Some(v) = changes.position {
            projectile.position = v;
        }
        if let Some(v) = changes.distance_traveled {
            projectile.distance_traveled = v;
        }
        self.pending_projectile_changes.entry(id).merge(changes);
    }

    /// Insert a freshly-spawned projectile and record its creation.
    pub fn spawn_projectile(&mut self, mut build: impl FnMut(u64) -> Projectile) -> u64 {
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;
        let projectile = build(id);
        self.delta_queue.push(DeltaRecord::ProjectileCreated {
            projectile_id: id,
            projectile: projectile.clone(),
        });
        self.projectiles.insert(id, projectile);
        id
    }

    /// Remove a projectile (spent, hit something, or left bounds).
    pub fn destroy_projectile(&mut self, id: u64) {
        if self.projectiles.remove(&id).is_some() {
            self.pending_projectile_changes.remove(&id);
            self.delta_queue.push(DeltaRecord::ProjectileDestroyed { projectile_id: id });
        }
    }

    /// Insert a freshly-spawned power-up and record its state.
    pub fn spawn_power_up(&mut self, build: impl FnOnce(u64) -> PowerUp) -> u64 {
        let id = self.next_powerup_id;
        self.next_powerup_id += 1;
        let power_up = build(id);
        self.delta_queue.push(DeltaRecord::PowerupState {
            powerup_id: id,
            powerup: power_up.clone(),
        });
        self.power_ups.insert(id, power_up);
        id
    }

    /// Record a power-up's state changing in place (collected or
    /// respawned).
    pub fn record_power_up_state(&mut self, id: u64) {
        if let Some(power_up) = self.power_ups.get(&id) {
            self.delta_queue.push(DeltaRecord::PowerupState {
                powerup_id: id,
                powerup: power_up.clone(),
            });
        }
    }

    /// Record a free-form game event (elimination, match end, etc).
    pub fn push_event(&mut self, event: impl Into<String>, payload: serde_json::Value) {
        self.delta_queue.push(DeltaRecord::GameEvent {
            event: event.into(),
            payload,
        });
    }

    /// Number of players currently alive.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    /// Transition `Waiting -> Active` once `min_players` is met.
    /// Returns `true` if a transition happened.
    pub fn maybe_start(&mut self, now: u64) -> bool {
        if self.status == MatchStatus::Waiting && self.players.len() >= self.min_players {
            self.status = MatchStatus::Active;
            self.started_at = Some(now);
            self.push_event("match_started", serde_json::json!({ "tick": self.tick_count }));
            true
        } else {
            false
        }
    }

    /// Transition `Active -> Finished` on alive-count, score-limit, or
    /// time-limit exhaustion (spec.md §4.6 step 9). Returns `true` if a
    /// transition happened.
    pub fn maybe_finish(&mut self, now: u64) -> bool {
        if self.status != MatchStatus::Active {
            return false;
        }
        let alive_exhausted = self.alive_count() <= 1;
        let score_exhausted = self
            .score_limit
            .is_some_and(|limit| self.scores.values().any(|&s| s >= limit));
        let time_exhausted = self.time_limit_ms.is_some_and(|limit| {
            self.started_at.is_some_and(|start| now.saturating_sub(start) >= limit)
        });

        if alive_exhausted || score_exhausted || time_exhausted {
            self.status = MatchStatus::Finished;
            self.push_event(
                "match_ended",
                serde_json::json!({
                    "tick": self.tick_count,
                    "reason": if alive_exhausted {
                        "elimination"
                    } else if score_exhausted {
                        "score_limit"
                    } else {
                        "time_limit"
                    },
                }),
            );
            true
        } else {
            false
        }
    }

    /// Declare a winner for a finished match: the last player standing
    /// if the match ended by elimination, otherwise the highest score.
    /// `None` for a draw (tied top score, or no players ever joined).
    pub fn winner(&self) -> Option<PlayerId> {
        if self.status != MatchStatus::Finished {
            return None;
        }
        if self.alive_count() == 1 {
            return self.players.values().find(|p| p.alive).map(|p| p.id.clone());
        }
        let top = self.scores.values().copied().max()?;
        let leaders: Vec<&PlayerId> = self.scores.iter().filter(|(_, &s)| s == top).map(|(id, _)| id).collect();
        match leaders.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        }
    }

    /// Fold pending field-level diffs into the delta queue and drain it
    /// into one batch, advancing the tick counter and clock (spec.md
    /// §4.6 step 10 "commit").
    pub fn commit(&mut self, now: u64) -> DeltaBatch {
        for (id, changes) in std::mem::take(&mut self.pending_player_changes) {
            if !changes.is_empty() {
                self.delta_queue.push(DeltaRecord::PlayerUpdated { player_id: id, changes });
            }
        }
        for (id, changes) in std::mem::take(&mut self.pending_projectile_changes) {
            if !changes.is_empty() {
                self.delta_queue.push(DeltaRecord::ProjectileUpdated { projectile_id: id, changes });
            }
        }

        self.tick_count += 1;
        self.last_tick = now;

        DeltaBatch {
            tick: self.tick_count,
            records: std::mem::take(&mut self.delta_queue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Vec2;
    use crate::game::weapon::WeaponType;

    fn sample_match() -> Match {
        Match::new(MatchId::generate(), WorldBounds::new(1000.0, 1000.0), 2, 4, None, None)
    }

    fn sample_player(name: &str) -> Player {
        Player::new(PlayerId::new(name), Vec2::new(10.0, 10.0), WeaponType::Rifle, 0)
    }

    #[test]
    fn join_rejects_duplicate_and_over_capacity() {
        let mut m = Match::new(MatchId::generate(), WorldBounds::new(100.0, 100.0), 1, 1, None, None);
        m.join(sample_player("a")).unwrap();
        assert_eq!(m.join(sample_player("a")).unwrap_err(), GameError::AlreadyJoined);
        assert_eq!(
            m.join(sample_player("b")).unwrap_err().reason(),
            "game_full"
        );
    }

    #[test]
    fn join_rejects_after_finished() {
        let mut m = sample_match();
        m.status = MatchStatus::Finished;
        assert_eq!(m.join(sample_player("a")).unwrap_err().reason(), "match_finished");
    }

    #[test]
    fn starts_once_min_players_reached() {
        let mut m = sample_match();
        m.join(sample_player("a")).unwrap();
        assert!(!m.maybe_start(0));
        m.join(sample_player("b")).unwrap();
        assert!(m.maybe_start(100));
        assert_eq!(m.status, MatchStatus::Active);
        assert_eq!(m.started_at, Some(100));
    }

    #[test]
    fn finishes_when_one_player_remains() {
        let mut m = sample_match();
        m.join(sample_player("a")).unwrap();
        m.join(sample_player("b")).unwrap();
        m.maybe_start(0);
        m.players.get_mut(&PlayerId::new("b")).unwrap().alive = false;
        assert!(m.maybe_finish(1000));
        assert_eq!(m.status, MatchStatus::Finished);
    }

    #[test]
    fn finishes_when_leave_drops_to_one_remaining_player() {
        let mut m = sample_match();
        m.join(sample_player("a")).unwrap();
        m.join(sample_player("b")).unwrap();
        m.maybe_start(0);
        m.leave(&PlayerId::new("b"));
        assert_eq!(m.players.len(), 1);
        assert!(m.maybe_finish(1000));
        assert_eq!(m.status, MatchStatus::Finished);
    }

    #[test]
    fn field_changes_merge_later_write_wins() {
        let mut m = sample_match();
        m.join(sample_player("a")).unwrap();
        let id = PlayerId::new("a");
        m.apply_player_changes(
            &id,
            PlayerFieldChanges { health: Some(80), ..Default::default() },
        );
        m.apply_player_changes(
            &id,
            PlayerFieldChanges { health: Some(60), position: Some(Vec2::new(5.0, 5.0)), ..Default::default() },
        );
        let batch = m.commit(0);
        let update = batch
            .records
            .iter()
            .find_map(|r| match r {
                DeltaRecord::PlayerUpdated { changes, .. } => Some(changes.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(update.health, Some(60));
        assert_eq!(update.position, Some(Vec2::new(5.0, 5.0)));
        assert_eq!(m.players[&id].health, 60);
    }

    #[test]
    fn destroyed_projectile_drops_pending_update() {
        let mut m = sample_match();
        let id = m.spawn_projectile(|id| {
            Projectile::spawn(id, PlayerId::new("a"), Vec2::ZERO, Vec2::new(1.0, 0.0), WeaponType::Rifle, 10.0, 0)
        });
        m.apply_projectile_changes(id, ProjectileFieldChanges { position: Some(Vec2::new(1.0, 1.0)), ..Default::default() });
        m.destroy_projectile(id);
        let batch = m.commit(0);
        let has_update = batch
            .records
            .iter()
            .any(|r| matches!(r, DeltaRecord::ProjectileUpdated { .. }));
        assert!(!has_update);
    }
}
