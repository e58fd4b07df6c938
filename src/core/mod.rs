//! Core primitives shared across the simulation.
//!
//! Everything here is pure data and pure functions: no networking, no
//! async, no process-wide mutable state.

pub mod bounds;
pub mod ids;
pub mod rng;
pub mod vector;

pub use bounds::WorldBounds;
pub use ids::{MatchId, PlayerId, SpectatorId};
pub use rng::MatchRng;
pub use vector::Vec2;
