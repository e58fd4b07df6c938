//! Power-up state.
//!
//! Respawn-delay / timed-buff mechanics grounded on the teacher's
//! `game/rune.rs` (spawn-wave bookkeeping) and `game/shrine.rs`
//! (timed buff application on collection), generalized from the
//! teacher's rune/shrine vocabulary to spec.md §3's power-up vocabulary.

use serde::{Deserialize, Serialize};

use crate::core::Vec2;

/// Power-up kind (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PowerUpType {
    /// Increases movement speed while active.
    SpeedBoost,
    /// Adds an additive damage multiplier while active.
    DamageBoost,
    /// Instantly restores health on pickup.
    HealthPack,
    /// Grants invulnerability while active.
    Shield,
    /// Reduces attack cooldown while active.
    RapidFire,
}

impl PowerUpType {
    /// How long a pickup of this type stays active once collected.
    pub fn duration_ms(self) -> u64 {
        match self {
            PowerUpType::HealthPack => 0, // instantaneous, not a timed buff
            PowerUpType::SpeedBoost => 10_000,
            PowerUpType::DamageBoost => 10_000,
            PowerUpType::Shield => 8_000,
            PowerUpType::RapidFire => 10_000,
        }
    }

    /// The effect magnitude applied while active.
    pub fn magnitude(self) -> f64 {
        match self {
            PowerUpType::SpeedBoost => 0.4,
            PowerUpType::DamageBoost => 0.5,
            PowerUpType::HealthPack => 40.0,
            PowerUpType::Shield => 1.0,
            PowerUpType::RapidFire => 0.5,
        }
    }
}

/// A power-up pickup on the field (spec.md §3 "PowerUp").
///
/// Invariant: once it goes inactive, it reactivates exactly once
/// `now - spawn_time >= respawn_delay`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PowerUp {
    /// Unique id, scoped to the owning match.
    pub id: u64,
    /// Power-up kind.
    pub kind: PowerUpType,
    /// World-space position.
    pub position: Vec2,
    /// `true` while available for pickup.
    pub active: bool,
    /// When this power-up last became active (ms since match start).
    pub spawn_time: u64,
    /// How long a pickup stays active once collected.
    pub duration: u64,
    /// Effect magnitude applied to the collecting player.
    pub magnitude: f64,
    /// Delay before respawning after being collected.
    pub respawn_delay: u64,
}

impl PowerUp {
    /// Spawn a new, active power-up of `kind` at `position`.
    pub fn spawn(id: u64, kind: PowerUpType, position: Vec2, now: u64, respawn_delay: u64) -> Self {
        Self {
            id,
            kind,
            position,
            active: true,
            spawn_time: now,
            duration: kind.duration_ms(),
            magnitude: kind.magnitude(),
            respawn_delay,
        }
    }

    /// Collision radius for power-up pickups.
    pub fn radius(&self) -> f64 {
        10.0
    }

    /// Mark this power-up collected (goes inactive until respawn).
    pub fn collect(&mut self, now: u64) {
        self.active = false;
        self.spawn_time = now;
    }

    /// Reactivate this power-up once its respawn delay has elapsed.
    /// Returns `true` if it transitioned from inactive to active.
    pub fn maybe_respawn(&mut self, now: u64) -> bool {
        if !self.active && now.saturating_sub(self.spawn_time) >= self.respawn_delay {
            self.active = true;
            self.spawn_time = now;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respawns_exactly_once_after_delay() {
        let mut p = PowerUp::spawn(1, PowerUpType::Shield, Vec2::ZERO, 0, 1000);
        p.collect(100);
        assert!(!p.active);
        assert!(!p.maybe_respawn(500));
        assert!(p.maybe_respawn(1100));
        assert!(p.active);
        // Already active: further calls are no-ops.
        assert!(!p.maybe_respawn(5000));
    }
}
