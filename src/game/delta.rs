//! Delta records.
//!
//! Tagged change records emitted by every mutation to match state
//! (spec.md §3 "Delta record", §9 "Deltas"). Field-level diffs are
//! computed at mutation time via explicit setter helpers on
//! `MatchState`/`PlayerState`/`ProjectileState` rather than a general
//! reflective diff, per the teacher's `push_event`/`GameEventData`
//! pattern in the (now-removed) `game/events.rs`.

use serde::{Deserialize, Serialize};

use super::player::Player;
use super::powerup::PowerUp;
use super::projectile::Projectile;
use crate::core::{PlayerId, Vec2};

/// Fields of a `Player` that changed since the last commit. `None` means
/// unchanged; a later write in the same tick overwrites an earlier one
/// for the same field ("later write wins per field", spec.md §4.7).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerFieldChanges {
    /// New position, if it moved.
    pub position: Option<Vec2>,
    /// New velocity, if it changed.
    pub velocity: Option<Vec2>,
    /// New health, if damaged or healed.
    pub health: Option<i64>,
    /// New alive flag, if it flipped.
    pub alive: Option<bool>,
    /// New mana, if spent or regenerated.
    pub mana: Option<i64>,
    /// New stamina, if spent or regenerated.
    pub stamina: Option<i64>,
    /// New blocking-until timestamp (ms), if it changed.
    pub blocking_until: Option<Option<u64>>,
    /// New invulnerable-until timestamp (ms), if it changed.
    pub invulnerable_until: Option<Option<u64>>,
    /// New casting-until timestamp (ms), if it changed.
    pub casting_until: Option<Option<u64>>,
}

impl PlayerFieldChanges {
    /// Merge `other` into `self`, later writes winning per field.
    pub fn merge(&mut self, other: PlayerFieldChanges) {
        if other.position.is_some() {
            self.position = other.position;
        }
        if other.velocity.is_some() {
            self.velocity = other.velocity;
        }
        if other.health.is_some() {
            self.health = other.health;
        }
        if other.alive.is_some() {
            self.alive = other.alive;
        }
        if other.mana.is_some() {
            self.mana = other.mana;
        }
        if other.stamina.is_some() {
            self.stamina = other.stamina;
        }
        if other.blocking_until.is_some() {
            self.blocking_until = other.blocking_until;
        }
        if other.invulnerable_until.is_some() {
            self.invulnerable_until = other.invulnerable_until;
        }
        if other.casting_until.is_some() {
            self.casting_until = other.casting_until;
        }
    }

    /// `true` if no field has a recorded change.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fields of a `Projectile` that changed since the last commit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectileFieldChanges {
    /// New position, if it moved.
    pub position: Option<Vec2>,
    /// New distance travelled, if it advanced.
    pub distance_traveled: Option<f64>,
}

impl ProjectileFieldChanges {
    /// Merge `other` into `self`, later writes winning per field.
    pub fn merge(&mut self, other: ProjectileFieldChanges) {
        if other.position.is_some() {
            self.position = other.position;
        }
        if other.distance_traveled.is_some() {
            self.distance_traveled = other.distance_traveled;
        }
    }

    /// `true` if no field has a recorded change.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A single tagged change record (spec.md §3 "Delta record").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeltaRecord {
    /// A player joined the match.
    PlayerJoined {
        /// The joining player's id.
        player_id: PlayerId,
        /// Full snapshot of the joining player (for late joiners/replay).
        player: Player,
    },
    /// Fields of an existing player changed this tick.
    PlayerUpdated {
        /// Which player changed.
        player_id: PlayerId,
        /// Only the fields whose value changed.
        changes: PlayerFieldChanges,
    },
    /// A player left the match.
    PlayerLeft {
        /// The leaving player's id.
        player_id: PlayerId,
    },
    /// A projectile was spawned.
    ProjectileCreated {
        /// The new projectile's id.
        projectile_id: u64,
        /// Full snapshot of the new projectile.
        projectile: Projectile,
    },
    /// Fields of an existing projectile changed this tick.
    ProjectileUpdated {
        /// Which projectile changed.
        projectile_id: u64,
        /// Only the fields whose value changed.
        changes: ProjectileFieldChanges,
    },
    /// A projectile expired, left bounds, or hit something.
    ProjectileDestroyed {
        /// The destroyed projectile's id.
        projectile_id: u64,
    },
    /// A power-up's active/inactive state changed.
    PowerupState {
        /// The power-up's id.
        powerup_id: u64,
        /// Full snapshot of the power-up's new state.
        powerup: PowerUp,
    },
    /// A notable game event (elimination, match end, etc).
    GameEvent {
        /// Machine-readable event name.
        event: String,
        /// Free-form JSON payload for the event.
        payload: serde_json::Value,
    },
}

/// An ordered batch of delta records produced by exactly one tick
/// (spec.md glossary "Delta batch").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeltaBatch {
    /// The tick this batch was committed at.
    pub tick: u64,
    /// Records in generation order.
    pub records: Vec<DeltaRecord>,
}
