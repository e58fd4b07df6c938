//! Weapon catalogue.
//!
//! `spec.md` §4.4 references `weapon.damage` and `effective_range`
//! without enumerating concrete weapons; this static table supplies
//! them (see `DESIGN.md` §"Supplemented features"). Grounded on the
//! teacher's per-form constant tables in `game/ability.rs`
//! (`ABILITY_COOLDOWNS`, `DASH_SPEED`, …).

use serde::{Deserialize, Serialize};

/// The kind of damage a weapon or ability deals, for armor/magic-resist
/// application in the combat resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageType {
    /// Mitigated by `armor`.
    Physical,
    /// Mitigated by `magic_resist`.
    Magic,
}

/// A weapon a player can wield.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponType {
    /// Short range, high proficiency gain.
    Melee,
    /// Fast cooldown sidearm.
    Sidearm,
    /// Standard ranged rifle.
    Rifle,
    /// Slow, high-damage launcher.
    Launcher,
    /// Magic-damage staff.
    Staff,
}

/// Tuned stats for a weapon.
#[derive(Clone, Copy, Debug)]
pub struct WeaponStats {
    /// Base damage before modifiers.
    pub base_damage: f64,
    /// Range at which falloff begins (spec.md §4.4).
    pub effective_range: f64,
    /// Absolute maximum range; beyond this a projectile is destroyed.
    pub max_range: f64,
    /// Cooldown between attacks, in milliseconds.
    pub cooldown_ms: u64,
    /// Projectile travel speed (units/sec); melee has no projectile.
    pub projectile_speed: f64,
    /// Damage type for armor/magic-resist application.
    pub damage_type: DamageType,
}

impl WeaponType {
    /// Look up this weapon's tuned stats.
    pub const fn stats(self) -> WeaponStats {
        match self {
            WeaponType::Melee => WeaponStats {
                base_damage: 18.0,
                effective_range: 8.0,
                max_range: 10.0,
                cooldown_ms: 500,
                projectile_speed: 0.0,
                damage_type: DamageType::Physical,
            },
            WeaponType::Sidearm => WeaponStats {
                base_damage: 12.0,
                effective_range: 60.0,
                max_range: 120.0,
                cooldown_ms: 250,
                projectile_speed: 400.0,
                damage_type: DamageType::Physical,
            },
            WeaponType::Rifle => WeaponStats {
                base_damage: 20.0,
                effective_range: 100.0,
                max_range: 220.0,
                cooldown_ms: 400,
                projectile_speed: 600.0,
                damage_type: DamageType::Physical,
            },
            WeaponType::Launcher => WeaponStats {
                base_damage: 45.0,
                effective_range: 80.0,
                max_range: 160.0,
                cooldown_ms: 1200,
                projectile_speed: 250.0,
                damage_type: DamageType::Physical,
            },
            WeaponType::Staff => WeaponStats {
                base_damage: 16.0,
                effective_range: 90.0,
                max_range: 180.0,
                cooldown_ms: 350,
                projectile_speed: 350.0,
                damage_type: DamageType::Magic,
            },
        }
    }
}
