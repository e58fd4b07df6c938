//! Match registry.
//!
//! Process-wide directory of live matches and which player is in which
//! one, `RwLock`-guarded since lookups vastly outnumber inserts/removes.
//! Grounded directly on the teacher's `SessionManager`
//! (`RwLock<BTreeMap<SessionId, Arc<RwLock<MatchSession>>>>` plus a
//! parallel `player_sessions` index, `cleanup()` sweeping closed
//! entries) in `network/session.rs`, with `SessionId`/`MatchSession`
//! swapped for [`MatchId`]/[`MatchActorHandle`] per spec.md §4.1
//! ("registry: id -> match actor handle, plus player -> match id").

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::ArenaConfig;
use crate::core::{MatchId, PlayerId, WorldBounds};
use crate::match_actor::{self, MatchActorHandle};
use crate::matchmaking::MatchmakerHandle;

/// Process-wide directory of live match actors.
pub struct MatchRegistry {
    config: Arc<ArenaConfig>,
    matchmaker: Option<MatchmakerHandle>,
    matches: RwLock<BTreeMap<MatchId, MatchActorHandle>>,
    player_matches: RwLock<BTreeMap<PlayerId, MatchId>>,
}

impl MatchRegistry {
    /// Construct an empty registry. `matchmaker`, when present, is
    /// threaded into every ranked match so it can report results back
    /// for Elo updates.
    pub fn new(config: Arc<ArenaConfig>, matchmaker: Option<MatchmakerHandle>) -> Self {
        Self {
            config,
            matchmaker,
            matches: RwLock::new(BTreeMap::new()),
            player_matches: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a new match and register it, returning its handle.
    pub async fn create_match(
        &self,
        bounds: WorldBounds,
        score_limit: Option<u32>,
        time_limit_ms: Option<u64>,
    ) -> MatchActorHandle {
        let id = MatchId::generate();
        let handle = match_actor::spawn(
            id,
            bounds,
            self.config.clone(),
            score_limit,
            time_limit_ms,
            self.matchmaker.clone(),
        );

        let mut matches = self.matches.write().await;
        matches.insert(id, handle.clone());
        handle
    }

    /// Look up a match's handle by id.
    pub async fn get(&self, id: &MatchId) -> Option<MatchActorHandle> {
        let matches = self.matches.read().await;
        matches.get(id).cloned()
    }

    /// Look up the match a player is currently registered to.
    pub async fn get_for_player(&self, player_id: &PlayerId) -> Option<MatchActorHandle> {
        let match_id = {
            let player_matches = self.player_matches.read().await;
            *player_matches.get(player_id)?
        };
        self.get(&match_id).await
    }

    /// Record that `player_id` is now playing in `match_id` (idempotent;
    /// overwrites any prior registration).
    pub async fn register_player(&self, player_id: PlayerId, match_id: MatchId) {
        let mut player_matches = self.player_matches.write().await;
        player_matches.insert(player_id, match_id);
    }

    /// Drop a player's match registration.
    pub async fn unregister_player(&self, player_id: &PlayerId) {
        let mut player_matches = self.player_matches.write().await;
        player_matches.remove(player_id);
    }

    /// Remove a match from the directory (its actor task may already
    /// have stopped, or may still be winding down).
    pub async fn remove(&self, id: &MatchId) {
        let mut matches = self.matches.write().await;
        matches.remove(id);
    }

    /// Number of matches currently tracked.
    pub async fn match_count(&self) -> usize {
        self.matches.read().await.len()
    }

    /// Snapshot every tracked `(match id, handle)` pair, for admin
    /// inspection (spec.md §4.11 permits iteration for this purpose).
    pub async fn iter(&self) -> Vec<(MatchId, MatchActorHandle)> {
        self.matches.read().await.iter().map(|(id, handle)| (*id, handle.clone())).collect()
    }

    /// Sweep every tracked match whose actor has shut down (dropped
    /// command channel), removing it and any player registrations that
    /// pointed at it. Mirrors the teacher's `SessionManager::cleanup`.
    pub async fn cleanup(&self) {
        let dead: Vec<MatchId> = {
            let matches = self.matches.read().await;
            let mut dead = Vec::new();
            for (id, handle) in matches.iter() {
                if handle.status().await.is_err() {
                    dead.push(*id);
                }
            }
            dead
        };

        if dead.is_empty() {
            return;
        }

        let mut matches = self.matches.write().await;
        let mut player_matches = self.player_matches.write().await;
        for id in &dead {
            matches.remove(id);
        }
        player_matches.retain(|_, match_id| !dead.contains(match_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Arc<ArenaConfig> {
        Arc::new(ArenaConfig::default())
    }

    #[tokio::test]
    async fn create_match_registers_it_for_lookup() {
        let registry = MatchRegistry::new(test_config(), None);
        let handle = registry.create_match(WorldBounds::new(1000.0, 1000.0), None, None).await;
        assert!(registry.get(handle.id()).await.is_some());
        assert_eq!(registry.match_count().await, 1);
        assert_eq!(registry.iter().await.len(), 1);
    }

    #[tokio::test]
    async fn player_registration_round_trips() {
        let registry = MatchRegistry::new(test_config(), None);
        let handle = registry.create_match(WorldBounds::new(1000.0, 1000.0), None, None).await;
        let player_id = PlayerId::new("p1");
        registry.register_player(player_id.clone(), *handle.id()).await;

        let found = registry.get_for_player(&player_id).await;
        assert_eq!(found.unwrap().id(), handle.id());

        registry.unregister_player(&player_id).await;
        assert!(registry.get_for_player(&player_id).await.is_none());
    }

    #[tokio::test]
    async fn remove_drops_a_match_from_the_directory() {
        let registry = MatchRegistry::new(test_config(), None);
        let handle = registry.create_match(WorldBounds::new(1000.0, 1000.0), None, None).await;
        registry.remove(handle.id()).await;
        assert!(registry.get(handle.id()).await.is_none());
    }
}
