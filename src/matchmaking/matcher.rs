//! Pairing pass: turns queued entries into matches.
//!
//! Grounded on the teacher's `run_matchmaking_loop` in `network/server.rs`
//! (a periodic sweep over `matchmaking_queue` pulling out compatible
//! pairs), generalized from "first two players, same mode" to the
//! region-aware, tolerance-widening rule in spec.md §4.10.

use std::collections::VecDeque;

use crate::matchmaking::queue::{QueueEntry, QueueTable};

/// Static region-adjacency table: which regions a queue entry is
/// willing to be paired across, beyond its own (spec.md §4.10 "region
/// policy: same region always allowed; adjacent regions allowed once
/// latency gate passes"). Resolved as a fixed table per the Open
/// Question note in `DESIGN.md`.
const REGION_ADJACENCY: &[(&str, &str)] = &[
    ("na_east", "na_west"),
    ("na_west", "na_east"),
    ("na_east", "eu_west"),
    ("eu_west", "na_east"),
    ("eu_west", "eu_east"),
    ("eu_east", "eu_west"),
    ("ap_southeast", "ap_northeast"),
    ("ap_northeast", "ap_southeast"),
];

fn regions_compatible(a: &str, b: &str) -> bool {
    a == b || REGION_ADJACENCY.iter().any(|(x, y)| x == &a && y == &b)
}

/// A pairing the matcher has decided on. The caller (matchmaker actor)
/// is responsible for actually spinning up the match and notifying
/// both players.
#[derive(Clone, Debug)]
pub struct MatchFound {
    pub mode: String,
    pub players: Vec<QueueEntry>,
}

/// How far a wait-widened skill tolerance has grown for a given wait
/// time (spec.md §4.10 "tolerance widens linearly with wait time, up
/// to `max_skill_tol`, gaining 10 points of slack per second waited").
fn skill_tolerance(wait_seconds: f64, base: f64, max: f64) -> f64 {
    (base + wait_seconds * 10.0).min(max)
}

/// Run one pairing pass over every (mode, region) bucket combination,
/// consuming compatible entries from `queue` and returning the matches
/// formed. `players_per_match` is the headcount spec.md §4.10 requires
/// before a pairing is finalized (2 for 1v1 modes).
pub fn run_pairing_pass(
    queue: &mut QueueTable,
    now_ms: u64,
    base_skill_tol: f64,
    max_skill_tol: f64,
    latency_tol_ms: u32,
    players_per_match: usize,
) -> Vec<MatchFound> {
    let mut found = Vec::new();

    // Group entries by mode first; region compatibility is checked
    // pairwise within a mode since two regions can be a valid pairing
    // even though their bucket keys differ.
    let mut by_mode: std::collections::BTreeMap<String, VecDeque<QueueEntry>> = std::collections::BTreeMap::new();
    for (key, bucket) in queue.buckets_mut() {
        let (mode, _region) = key;
        by_mode.entry(mode.clone()).or_default().extend(bucket.drain(..));
    }

    for (mode, mut pool) in by_mode {
        let mut matched_ids = std::collections::BTreeSet::new();
        let entries: Vec<QueueEntry> = pool.drain(..).collect();

        for i in 0..entries.len() {
            if matched_ids.contains(&entries[i].player_id) {
                continue;
            }
            let mut group = vec![entries[i].clone()];
            // Per spec.md §4.10 step 2, the tolerance for this pass is
            // widened only by the popped head entry's own wait time —
            // a candidate can't borrow a longer-waiting entry's slack.
            let skill_tol = skill_tolerance(entries[i].wait_seconds(now_ms), base_skill_tol, max_skill_tol);

            for j in (i + 1)..entries.len() {
                if group.len() >= players_per_match {
                    break;
                }
                if matched_ids.contains(&entries[j].player_id) {
                    continue;
                }
                let candidate = &entries[j];
                let rating_gap = (entries[i].rating - candidate.rating).abs();

                if rating_gap > skill_tol {
                    continue;
                }
                if !regions_compatible(&entries[i].region, &candidate.region) {
                    continue;
                }
                if candidate.latency_ms > latency_tol_ms || entries[i].latency_ms > latency_tol_ms {
                    continue;
                }

                group.push(candidate.clone());
            }

            if group.len() == players_per_match {
                for member in &group {
                    matched_ids.insert(member.player_id.clone());
                }
                found.push(MatchFound { mode: mode.clone(), players: group });
            }
        }

        // Re-queue everyone not matched this pass, preserving FIFO order.
        for entry in entries {
            if !matched_ids.contains(&entry.player_id) {
                queue.enqueue(entry);
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlayerId;

    fn entry(id: &str, mode: &str, region: &str, rating: f64, latency_ms: u32, joined_at_ms: u64) -> QueueEntry {
        QueueEntry { player_id: PlayerId::new(id), rating, latency_ms, mode: mode.into(), region: region.into(), joined_at_ms }
    }

    #[test]
    fn pairs_two_close_ratings_in_same_region() {
        let mut q = QueueTable::new();
        q.enqueue(entry("a", "1v1", "na_east", 1200.0, 40, 0));
        q.enqueue(entry("b", "1v1", "na_east", 1210.0, 40, 0));
        let found = run_pairing_pass(&mut q, 1000, 100.0, 300.0, 150, 2);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].players.len(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn leaves_lone_entry_queued() {
        let mut q = QueueTable::new();
        q.enqueue(entry("a", "1v1", "na_east", 1200.0, 40, 0));
        let found = run_pairing_pass(&mut q, 1000, 100.0, 300.0, 150, 2);
        assert!(found.is_empty());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn far_apart_ratings_stay_unpaired_until_wait_widens_tolerance() {
        let mut q = QueueTable::new();
        q.enqueue(entry("a", "1v1", "na_east", 1200.0, 40, 0));
        q.enqueue(entry("b", "1v1", "na_east", 1600.0, 40, 0));
        let early = run_pairing_pass(&mut q, 1000, 100.0, 500.0, 150, 2);
        assert!(early.is_empty());

        // After enough wait, tolerance widens past the 400-point gap.
        let late = run_pairing_pass(&mut q, 100_000, 100.0, 500.0, 150, 2);
        assert_eq!(late.len(), 1);
    }

    #[test]
    fn incompatible_regions_never_pair() {
        let mut q = QueueTable::new();
        q.enqueue(entry("a", "1v1", "na_east", 1200.0, 40, 0));
        q.enqueue(entry("b", "1v1", "ap_southeast", 1200.0, 40, 0));
        let found = run_pairing_pass(&mut q, 100_000, 100.0, 500.0, 150, 2);
        assert!(found.is_empty());
    }

    #[test]
    fn latency_gate_blocks_pairing_regardless_of_rating() {
        let mut q = QueueTable::new();
        q.enqueue(entry("a", "1v1", "na_east", 1200.0, 200, 0));
        q.enqueue(entry("b", "1v1", "na_east", 1200.0, 40, 0));
        let found = run_pairing_pass(&mut q, 1000, 100.0, 500.0, 150, 2);
        assert!(found.is_empty());
    }
}
