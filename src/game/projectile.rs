//! Projectile state.
//!
//! Field layout grounded on the teacher's entity structs in
//! `game/state.rs`; behavior is new per spec.md §3/§4.5 (the teacher has
//! no ranged-weapon projectiles).

use serde::{Deserialize, Serialize};

use super::weapon::{DamageType, WeaponType};
use crate::core::{PlayerId, Vec2};

/// A live projectile in flight (spec.md §3 "Projectile").
///
/// Invariant: `distance_traveled < range` while live; a projectile never
/// damages `owner_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique id, scoped to the owning match.
    pub id: u64,
    /// The player who fired this projectile.
    pub owner_id: PlayerId,
    /// World-space position.
    pub position: Vec2,
    /// World-space velocity.
    pub velocity: Vec2,
    /// Collision radius.
    pub size: f64,
    /// Damage dealt on hit, already resolved by the combat resolver at
    /// spawn time (falloff is then applied at impact based on distance
    /// travelled so far).
    pub damage: f64,
    /// Damage type, for armor/magic-resist application.
    pub damage_type: DamageType,
    /// Maximum travel distance before despawning.
    pub range: f64,
    /// Distance travelled so far; monotonically increasing.
    pub distance_traveled: f64,
    /// The weapon type that fired this projectile.
    pub weapon: WeaponType,
    /// When this projectile was created (ms since match start).
    pub created_at: u64,
}

impl Projectile {
    /// Construct a projectile fired by `owner_id` from `position`
    /// towards `direction` (normalized internally).
    pub fn spawn(
        id: u64,
        owner_id: PlayerId,
        position: Vec2,
        direction: Vec2,
        weapon: WeaponType,
        damage: f64,
        created_at: u64,
    ) -> Self {
        let stats = weapon.stats();
        Self {
            id,
            owner_id,
            position,
            velocity: direction.normalize().scale(stats.projectile_speed),
            size: 4.0,
            damage,
            damage_type: stats.damage_type,
            range: stats.max_range,
            distance_traveled: 0.0,
            weapon,
            created_at,
        }
    }

    /// `true` once this projectile has travelled its full range.
    pub fn is_spent(&self) -> bool {
        self.distance_traveled >= self.range
    }

    /// Falloff-adjusted damage at the current travel distance, per the
    /// linear falloff formula in spec.md §4.4: beyond `effective_range`,
    /// damage decays linearly to a floor.
    pub fn falloff_damage(&self, effective_range: f64) -> f64 {
        linear_falloff(self.damage, self.distance_traveled, effective_range)
    }
}

/// Linear damage falloff shared by every attack/projectile hit (spec.md
/// §4.4 step 2): full `damage` within `effective_range`, decaying
/// linearly to a floor beyond it.
pub fn linear_falloff(damage: f64, distance: f64, effective_range: f64) -> f64 {
    const DAMAGE_FLOOR: f64 = 0.1;
    if distance <= effective_range || effective_range <= 0.0 {
        return damage;
    }
    let overshoot = distance - effective_range;
    let factor = (1.0 - (overshoot / effective_range) * 0.3).max(DAMAGE_FLOOR);
    damage * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_never_targets_owner() {
        let owner = PlayerId::new("shooter");
        let p = Projectile::spawn(
            1,
            owner.clone(),
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            WeaponType::Rifle,
            20.0,
            0,
        );
        assert_eq!(p.owner_id, owner);
    }

    #[test]
    fn is_spent_once_range_reached() {
        let mut p = Projectile::spawn(
            1,
            PlayerId::new("a"),
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            WeaponType::Rifle,
            20.0,
            0,
        );
        assert!(!p.is_spent());
        p.distance_traveled = p.range;
        assert!(p.is_spent());
    }

    #[test]
    fn falloff_never_exceeds_base_damage() {
        let mut p = Projectile::spawn(
            1,
            PlayerId::new("a"),
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            WeaponType::Rifle,
            100.0,
            0,
        );
        p.distance_traveled = 150.0;
        let falloff = p.falloff_damage(100.0);
        assert!(falloff < 100.0);
        assert!(falloff >= 10.0);
    }
}
