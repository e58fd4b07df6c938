//! Player state.
//!
//! Field layout and invariant comments grounded on `PlayerState` in the
//! teacher's `game/state.rs`, generalized from fixed-point Q16.16 to
//! `f64` and from the teacher's evolution-form vocabulary to spec.md
//! §3's attack/armor/mana/stamina vocabulary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::powerup::PowerUpType;
use super::weapon::WeaponType;
use crate::core::{PlayerId, Vec2};

/// Collision radius shared by every player (spec.md doesn't vary this
/// per player, unlike the teacher's per-form radii).
pub const PLAYER_RADIUS: f64 = 16.0;

/// Ability a player can `cast` (spec.md §4.4 "cast(ability)").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityType {
    /// Heals the caster.
    Heal,
    /// Area-of-effect burst centered on the caster.
    Nova,
    /// Short forward dash (also reachable via the `dodge` action).
    Blink,
}

/// Attack/defense stats (spec.md §3 "stats map").
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Flat attack power added to weapon base damage.
    pub attack: f64,
    /// Physical damage mitigation.
    pub armor: f64,
    /// Magic damage mitigation.
    pub magic_resist: f64,
    /// Additional chance to land a critical hit.
    pub critical_chance: f64,
    /// Accuracy, which also nudges crit chance (spec.md §4.4).
    pub accuracy: f64,
}

/// Timed status flags with end timestamps (ms since match start).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct StatusFlags {
    /// Set while blocking; incoming damage is reduced until this time.
    pub blocking_until: Option<u64>,
    /// Set while invulnerable (e.g. a dodge window); damage is ignored.
    pub invulnerable_until: Option<u64>,
    /// Set while channeling an ability; movement/actions may be gated.
    pub casting_until: Option<u64>,
}

impl StatusFlags {
    /// `true` if `blocking_until` has not yet elapsed.
    pub fn is_blocking(&self, now: u64) -> bool {
        self.blocking_until.is_some_and(|end| now < end)
    }

    /// `true` if `invulnerable_until` has not yet elapsed.
    pub fn is_invulnerable(&self, now: u64) -> bool {
        self.invulnerable_until.is_some_and(|end| now < end)
    }

    /// `true` if `casting_until` has not yet elapsed.
    pub fn is_casting(&self, now: u64) -> bool {
        self.casting_until.is_some_and(|end| now < end)
    }

    /// Clear any flag whose end time has passed (spec.md §3 invariant:
    /// "status flags clear when now ≥ end_time").
    pub fn clear_expired(&mut self, now: u64) {
        if self.blocking_until.is_some_and(|end| now >= end) {
            self.blocking_until = None;
        }
        if self.invulnerable_until.is_some_and(|end| now >= end) {
            self.invulnerable_until = None;
        }
        if self.casting_until.is_some_and(|end| now >= end) {
            self.casting_until = None;
        }
    }
}

/// Cooldown timestamps (ms since match start). Invariant: monotonic —
/// a cooldown timestamp is only ever advanced, never rewound.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Cooldowns {
    /// Last time `attack` was used.
    pub last_attack: u64,
    /// Last time `block` was used.
    pub last_block: u64,
    /// Last time `dodge` was used.
    pub last_dodge: u64,
    /// Last time `cast` was used.
    pub last_cast: u64,
    /// Last time damage was taken (drives resource regen delay).
    pub last_damage: u64,
}

/// An active power-up effect applied to a player.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ActivePowerUpEffect {
    /// Multiplier/bonus magnitude contributed by this effect.
    pub modifier: f64,
    /// When this effect expires (ms since match start).
    pub end_time: u64,
}

/// A connected player's full simulation state (spec.md §3 "Player").
///
/// Invariants: `alive == (health > 0)`; `position` always lies inside
/// the match's world bounds after any committed tick; cooldown
/// timestamps are monotonic; status flags self-clear once expired.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Caller-supplied opaque identifier. This server has no separate
    /// account/owner concept of its own — auth/session issuance is an
    /// external collaborator (spec.md §1) — so `id` doubles as the
    /// owning user id referenced by spec.md §3.
    pub id: PlayerId,
    /// World-space position.
    pub position: Vec2,
    /// World-space velocity.
    pub velocity: Vec2,
    /// Current health.
    pub health: i64,
    /// Maximum health.
    pub max_health: i64,
    /// Current mana.
    pub mana: i64,
    /// Maximum mana.
    pub max_mana: i64,
    /// Current stamina.
    pub stamina: i64,
    /// Maximum stamina.
    pub max_stamina: i64,
    /// `true` iff `health > 0`.
    pub alive: bool,
    /// Equipped weapon.
    pub weapon: WeaponType,
    /// Levels of proficiency earned with the equipped weapon (+5%/level
    /// damage, spec.md §4.4).
    pub weapon_proficiency: u32,
    /// Attack/defense stats.
    pub stats: Stats,
    /// Timed status flags.
    pub status: StatusFlags,
    /// Action cooldown timestamps.
    pub cooldowns: Cooldowns,
    /// Ability bound to the `cast` action, if any.
    pub selected_ability: Option<AbilityType>,
    /// Active power-up effects by type.
    pub power_ups: BTreeMap<PowerUpType, ActivePowerUpEffect>,
    /// Elo-derived skill rating, mirrored from the matchmaker at join time.
    pub skill_rating: f64,
    /// When this player joined the match (ms since match start).
    pub joined_at: u64,
}

impl Player {
    /// Construct a freshly-joined player at `position`.
    pub fn new(id: PlayerId, position: Vec2, weapon: WeaponType, joined_at: u64) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            health: 100,
            max_health: 100,
            mana: 100,
            max_mana: 100,
            stamina: 100,
            max_stamina: 100,
            alive: true,
            weapon,
            weapon_proficiency: 0,
            stats: Stats::default(),
            status: StatusFlags::default(),
            cooldowns: Cooldowns::default(),
            selected_ability: None,
            power_ups: BTreeMap::new(),
            skill_rating: 1200.0,
            joined_at,
        }
    }

    /// Collision radius (uniform across players, see `PLAYER_RADIUS`).
    pub fn radius(&self) -> f64 {
        PLAYER_RADIUS
    }

    /// Total additive damage-boost modifier from active power-ups.
    pub fn damage_boost(&self) -> f64 {
        self.power_ups
            .get(&PowerUpType::DamageBoost)
            .map(|e| e.modifier)
            .unwrap_or(0.0)
    }

    /// `true` if a speed-boost power-up is active.
    pub fn has_speed_boost(&self) -> bool {
        self.power_ups.contains_key(&PowerUpType::SpeedBoost)
    }

    /// `true` if a shield power-up is active (grants invulnerability).
    pub fn has_shield(&self) -> bool {
        self.power_ups.contains_key(&PowerUpType::Shield)
    }

    /// Drop every power-up effect whose `end_time` has passed.
    pub fn expire_power_ups(&mut self, now: u64) {
        self.power_ups.retain(|_, effect| effect.end_time > now);
    }

    /// Apply damage, clamping health at zero and flipping `alive`.
    /// Returns the actual (possibly clamped) amount of health lost.
    pub fn apply_damage(&mut self, amount: i64, now: u64) -> i64 {
        let before = self.health;
        self.health = (self.health - amount.max(0)).max(0);
        self.cooldowns.last_damage = now;
        if self.health == 0 {
            self.alive = false;
        }
        before - self.health
    }

    /// Apply healing, clamping at `max_health`. No-op on a dead player.
    pub fn heal(&mut self, amount: i64) -> i64 {
        if !self.alive {
            return 0;
        }
        let before = self.health;
        self.health = (self.health + amount.max(0)).min(self.max_health);
        self.health - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_player() -> Player {
        Player::new(PlayerId::new("p1"), Vec2::new(10.0, 10.0), WeaponType::Rifle, 0)
    }

    #[test]
    fn alive_matches_health_invariant() {
        let mut p = sample_player();
        assert!(p.alive);
        p.apply_damage(100, 10);
        assert_eq!(p.health, 0);
        assert!(!p.alive);
    }

    #[test]
    fn damage_does_not_go_negative() {
        let mut p = sample_player();
        p.apply_damage(1000, 0);
        assert_eq!(p.health, 0);
    }

    #[test]
    fn heal_is_noop_when_dead() {
        let mut p = sample_player();
        p.apply_damage(100, 0);
        let healed = p.heal(50);
        assert_eq!(healed, 0);
        assert_eq!(p.health, 0);
    }

    #[test]
    fn heal_clamps_to_max_health() {
        let mut p = sample_player();
        p.apply_damage(10, 0);
        let healed = p.heal(1000);
        assert_eq!(healed, 10);
        assert_eq!(p.health, p.max_health);
    }

    #[test]
    fn status_flags_self_clear() {
        let mut status = StatusFlags {
            blocking_until: Some(100),
            ..Default::default()
        };
        assert!(status.is_blocking(50));
        status.clear_expired(100);
        assert!(status.blocking_until.is_none());
    }
}
