//! Network layer.
//!
//! WebSocket transport for real-time multiplayer communication. This
//! layer is deliberately thin: it decodes/encodes wire messages and
//! forwards them to the simulation layer (`match_actor`, `registry`,
//! `matchmaking`, `spectator`); no game logic lives here.

pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{ClientMessage, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig};
pub use session::ClientSession;
