//! # Arena Server
//!
//! A real-time multiplayer arena: players queue for a mode and region,
//! get paired by skill rating and latency, then play out a fixed-tick
//! combat match simulated by its own owning task.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ARENA SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/          - Shared primitives (vectors, ids, rng)      │
//! │  game/          - Match simulation                           │
//! │  ├── state.rs   - Authoritative match/player/entity state    │
//! │  ├── tick.rs    - Fixed-tick simulation pipeline              │
//! │  ├── combat.rs  - Weapon resolution and damage                │
//! │  └── grid.rs    - Spatial broad-phase collision               │
//! │  match_actor.rs - One owning task per live match              │
//! │  broadcast.rs   - Delta/keyframe fan-out to subscribers       │
//! │  replay.rs       - Bounded snapshot history for spectators    │
//! │  spectator.rs   - Spectator rooms and replay recording        │
//! │  matchmaking/   - Queueing, skill rating, pairing             │
//! │  registry.rs    - Live match directory                       │
//! │  network/       - WebSocket transport and wire protocol      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Randomness
//!
//! `game/` simulates on plain `f64` state advanced once per fixed
//! tick from queued player input. Each match owns a `MatchRng` seeded
//! from OS entropy at spawn time (crit rolls, power-up placement,
//! spawn jitter) — replay/determinism is not a goal of this server;
//! the replay ring (`replay.rs`) records observed state for spectators
//! rather than reproducing a match bit-for-bit from its inputs.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod match_actor;
pub mod matchmaking;
pub mod network;
pub mod registry;
pub mod replay;
pub mod spectator;

pub use config::ArenaConfig;
pub use core::{MatchId, PlayerId, SpectatorId};
pub use error::{GameError, GameResult};
pub use match_actor::MatchActorHandle;
pub use registry::MatchRegistry;

/// Crate version, surfaced in `ping`/`pong` handshakes and logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
