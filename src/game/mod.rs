//! Game Logic Module
//!
//! All game simulation code: player/projectile/power-up state, physics,
//! collision, combat resolution, and the authoritative per-tick pipeline.
//!
//! ## Module Structure
//!
//! - `player`: Player state, stats, cooldowns, status flags
//! - `weapon`: Weapon stat table
//! - `powerup`: Power-up pickups and respawn mechanics
//! - `projectile`: Ranged-weapon projectiles
//! - `grid`: Spatial broad-phase index
//! - `physics`: Fixed-dt integration
//! - `collision`: Collision detection and resolution
//! - `combat`: Attack/block/dodge/cast resolution and damage formula
//! - `delta`: Tagged change records
//! - `state`: Match state and lifecycle
//! - `tick`: Authoritative simulation loop

pub mod collision;
pub mod combat;
pub mod delta;
pub mod grid;
pub mod physics;
pub mod player;
pub mod powerup;
pub mod projectile;
pub mod state;
pub mod tick;
pub mod weapon;

pub use delta::{DeltaBatch, DeltaRecord};
pub use player::Player;
pub use state::{Match, MatchStatus};
pub use tick::{tick, PlayerInput, TickReport};
