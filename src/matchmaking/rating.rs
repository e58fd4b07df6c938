//! Elo-derived skill rating table.
//!
//! One entry per player who has ever queued. Grounded on the teacher's
//! plain-struct-plus-`HashMap` bookkeeping style (`game/state.rs`), with
//! the rating formulas themselves built directly from spec.md §4.10
//! (the teacher has no skill-rating concept at all — matches there are
//! "first two players in queue").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// Lower bound any rating can decay or lose its way to.
pub const RATING_FLOOR: f64 = 100.0;
/// Upper bound a rating can climb to.
pub const RATING_CEILING: f64 = 3000.0;
/// Starting rating for a player with no history (spec.md §3 "default 1200").
pub const DEFAULT_RATING: f64 = 1200.0;
/// Elo K-factor (spec.md §4.10).
pub const K_FACTOR: f64 = 32.0;
/// Starting volatility for a brand-new rating.
pub const DEFAULT_VOLATILITY: f64 = 0.6;
/// Days of inactivity before decay begins applying (resolved constant;
/// spec.md names `DECAY_DAYS`/`DECAY_RATE` without values).
pub const DECAY_DAYS: u64 = 14;
/// Rating points shed per day of inactivity beyond `DECAY_DAYS`.
pub const DECAY_RATE: f64 = 5.0;

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// One player's persistent matchmaking rating (spec.md §3 "Skill rating").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkillRating {
    /// The player this rating belongs to.
    pub player_id: PlayerId,
    /// Current Elo-derived rating, always within `[RATING_FLOOR, RATING_CEILING]`.
    pub rating: f64,
    /// Total games counted toward this rating.
    pub games: u32,
    /// Total wins.
    pub wins: u32,
    /// Total losses.
    pub losses: u32,
    /// Last time this rating changed (ms, process-relative).
    pub last_updated_ms: u64,
    /// Diagnostic moving volatility, `[0.1, 1.0]`.
    pub volatility: f64,
}

impl SkillRating {
    fn fresh(player_id: PlayerId, now_ms: u64) -> Self {
        Self {
            player_id,
            rating: DEFAULT_RATING,
            games: 0,
            wins: 0,
            losses: 0,
            last_updated_ms: now_ms,
            volatility: DEFAULT_VOLATILITY,
        }
    }

    /// Rating after applying linear decay for time elapsed since
    /// `last_updated_ms` beyond `DECAY_DAYS` of inactivity (spec.md
    /// glossary "Elo decay: linear reduction ... floored to RATING_FLOOR").
    fn decayed_rating(&self, now_ms: u64) -> f64 {
        let idle_days = now_ms.saturating_sub(self.last_updated_ms) / MS_PER_DAY;
        if idle_days <= DECAY_DAYS {
            return self.rating;
        }
        let decay = (idle_days - DECAY_DAYS) as f64 * DECAY_RATE;
        (self.rating - decay).max(RATING_FLOOR)
    }
}

/// Outcome of a completed 1v1 match, for [`RatingTable::record_result`].
#[derive(Clone, Copy, Debug)]
pub struct EloDelta {
    /// Rating change applied to the winner (positive or zero).
    pub winner_delta: f64,
    /// Rating change applied to the loser (negative or zero).
    pub loser_delta: f64,
}

/// Process-local table of every player's skill rating, owned exclusively
/// by the matchmaker (spec.md §5 "Skill-rating table: owned by the
/// matchmaker; mutations serialised through it").
#[derive(Default)]
pub struct RatingTable {
    ratings: HashMap<PlayerId, SkillRating>,
}

impl RatingTable {
    /// Construct an empty table.
    pub fn new() -> Self {
        Self { ratings: HashMap::new() }
    }

    /// Look up a player's current (decay-applied) rating, initializing a
    /// fresh `DEFAULT_RATING` entry if this is their first time queuing.
    pub fn snapshot(&mut self, player_id: &PlayerId, now_ms: u64) -> f64 {
        let entry = self
            .ratings
            .entry(player_id.clone())
            .or_insert_with(|| SkillRating::fresh(player_id.clone(), now_ms));
        let decayed = entry.decayed_rating(now_ms);
        entry.rating = decayed;
        entry.last_updated_ms = entry.last_updated_ms.max(now_ms.saturating_sub(1));
        decayed
    }

    /// Look up a rating without mutating or initializing anything.
    pub fn get(&self, player_id: &PlayerId) -> Option<&SkillRating> {
        self.ratings.get(player_id)
    }

    /// Apply the standard Elo update (spec.md §4.10) for a finished match
    /// between `winner` and `loser`, updating both players' win/loss
    /// counts, ratings (clamped), and volatility. Returns the deltas
    /// applied so callers can verify the zero-sum property.
    pub fn record_result(&mut self, winner: &PlayerId, loser: &PlayerId, now_ms: u64) -> EloDelta {
        let r_winner = self.snapshot(winner, now_ms);
        let r_loser = self.snapshot(loser, now_ms);

        let expected_winner = 1.0 / (1.0 + 10f64.powf((r_loser - r_winner) / 400.0));
        let expected_loser = 1.0 - expected_winner;

        let winner_delta = K_FACTOR * (1.0 - expected_winner);
        let loser_delta = K_FACTOR * (0.0 - expected_loser);

        if let Some(entry) = self.ratings.get_mut(winner) {
            entry.rating = (entry.rating + winner_delta).clamp(RATING_FLOOR, RATING_CEILING);
            entry.games += 1;
            entry.wins += 1;
            entry.last_updated_ms = now_ms;
            entry.volatility = (entry.volatility + (1.0 - expected_winner).abs() * 0.1 - 0.05).clamp(0.1, 1.0);
        }
        if let Some(entry) = self.ratings.get_mut(loser) {
            entry.rating = (entry.rating + loser_delta).clamp(RATING_FLOOR, RATING_CEILING);
            entry.games += 1;
            entry.losses += 1;
            entry.last_updated_ms = now_ms;
            entry.volatility = (entry.volatility + (0.0 - expected_loser).abs() * 0.1 - 0.05).clamp(0.1, 1.0);
        }

        EloDelta { winner_delta, loser_delta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_player_gets_default_rating() {
        let mut table = RatingTable::new();
        assert_eq!(table.snapshot(&PlayerId::new("a"), 0), DEFAULT_RATING);
    }

    #[test]
    fn even_match_winner_gains_half_k() {
        let mut table = RatingTable::new();
        let winner = PlayerId::new("a");
        let loser = PlayerId::new("b");
        table.snapshot(&winner, 0);
        table.snapshot(&loser, 0);
        let delta = table.record_result(&winner, &loser, 0);
        assert!((delta.winner_delta - 16.0).abs() < 1e-9);
        assert!((delta.loser_delta + 16.0).abs() < 1e-9);
        assert_eq!(table.get(&winner).unwrap().rating, DEFAULT_RATING + 16.0);
        assert_eq!(table.get(&loser).unwrap().rating, DEFAULT_RATING - 16.0);
    }

    #[test]
    fn rating_change_is_zero_sum() {
        let mut table = RatingTable::new();
        let winner = PlayerId::new("a");
        let loser = PlayerId::new("b");
        table.snapshot(&winner, 0);
        table.snapshot(&loser, 0);
        let delta = table.record_result(&winner, &loser, 0);
        assert!((delta.winner_delta + delta.loser_delta).abs() < 1e-9);
    }

    #[test]
    fn rating_never_drops_below_floor() {
        let mut table = RatingTable::new();
        let winner = PlayerId::new("a");
        let loser = PlayerId::new("b");
        for _ in 0..1000 {
            table.record_result(&winner, &loser, 0);
        }
        assert!(table.get(&loser).unwrap().rating >= RATING_FLOOR);
    }

    #[test]
    fn long_idle_decays_toward_floor() {
        let mut table = RatingTable::new();
        let p = PlayerId::new("a");
        table.snapshot(&p, 0);
        table.ratings.get_mut(&p).unwrap().rating = 1500.0;
        table.ratings.get_mut(&p).unwrap().last_updated_ms = 0;
        let decayed = table.snapshot(&p, (DECAY_DAYS + 10) * MS_PER_DAY);
        assert!(decayed < 1500.0);
    }

    proptest::proptest! {
        /// The Elo update is zero-sum for any pair of starting ratings
        /// within the valid range (spec.md §4.10 "winner_delta +
        /// loser_delta == 0"), and never pushes either rating outside
        /// `[RATING_FLOOR, RATING_CEILING]`.
        #[test]
        fn elo_update_is_zero_sum_and_stays_in_bounds(
            winner_rating in RATING_FLOOR..RATING_CEILING,
            loser_rating in RATING_FLOOR..RATING_CEILING,
        ) {
            let mut table = RatingTable::new();
            let winner = PlayerId::new("w");
            let loser = PlayerId::new("l");
            table.snapshot(&winner, 0);
            table.snapshot(&loser, 0);
            table.ratings.get_mut(&winner).unwrap().rating = winner_rating;
            table.ratings.get_mut(&loser).unwrap().rating = loser_rating;

            let delta = table.record_result(&winner, &loser, 0);
            proptest::prop_assert!((delta.winner_delta + delta.loser_delta).abs() < 1e-6);
            proptest::prop_assert!(table.get(&winner).unwrap().rating >= RATING_FLOOR);
            proptest::prop_assert!(table.get(&winner).unwrap().rating <= RATING_CEILING);
            proptest::prop_assert!(table.get(&loser).unwrap().rating >= RATING_FLOOR);
            proptest::prop_assert!(table.get(&loser).unwrap().rating <= RATING_CEILING);
        }
    }
}
