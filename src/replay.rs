//! Replay ring.
//!
//! A bounded, append-only log of state snapshots for one match, so a
//! spectator that joins late — or an admin inspecting a live match —
//! can ask "what did the arena look like 250ms into this match" without
//! the match loop keeping full history around forever. Grounded in the
//! idiom of `game/state.rs`'s bounded entity collections and
//! `network/session.rs`'s id-keyed bookkeeping; the teacher has no
//! spectator/replay concept of its own (spec.md §4.9).

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::broadcast::FullStateSnapshot;

/// One recorded point in a match's history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// Milliseconds since recording started.
    pub relative_ms: u64,
    /// Wall-clock milliseconds at capture time.
    pub absolute_ms: u64,
    /// `FullStateSnapshot`, `bincode`-encoded for compact storage.
    pub encoded: Vec<u8>,
}

/// Aggregate counters returned by [`ReplayRing::stats`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ReplayStats {
    /// Number of snapshots currently retained.
    pub count: usize,
    /// Wall-clock ms when recording started.
    pub start_time_ms: u64,
    /// Milliseconds elapsed since recording started.
    pub runtime_ms: u64,
    /// Approximate bytes held by retained snapshots.
    pub memory_bytes: usize,
}

/// How often the retention sweep runs even without an append forcing
/// it (spec.md §4.9 "periodic sweep, default every 60 s").
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Bounded, time-indexed snapshot log for one match.
pub struct ReplayRing {
    snapshots: VecDeque<Snapshot>,
    max_snapshots: usize,
    retention: Duration,
    snapshot_interval: Duration,
    start_time_ms: u64,
    last_recorded_relative: Option<u64>,
    last_swept_relative: u64,
}

impl ReplayRing {
    /// Construct an empty ring, recording starting at `start_time_ms`.
    pub fn new(max_snapshots: usize, retention: Duration, snapshot_interval: Duration, start_time_ms: u64) -> Self {
        Self {
            snapshots: VecDeque::new(),
            max_snapshots,
            retention,
            snapshot_interval,
            start_time_ms,
            last_recorded_relative: None,
            last_swept_relative: 0,
        }
    }

    /// Record one snapshot if the sampling floor allows it. `now_ms` is
    /// the current wall clock; the match loop may call this every tick,
    /// but entries closer together than `snapshot_interval` are
    /// silently discarded (spec.md §4.9 "sub-interval records are
    /// discarded").
    pub fn record(&mut self, now_ms: u64, snapshot: &FullStateSnapshot) {
        let relative_ms = now_ms.saturating_sub(self.start_time_ms);
        if let Some(last) = self.last_recorded_relative {
            if relative_ms.saturating_sub(last) < self.snapshot_interval.as_millis() as u64 {
                return;
            }
        }

        let encoded = bincode::serialize(snapshot).unwrap_or_default();
        self.snapshots.push_back(Snapshot { relative_ms, absolute_ms: now_ms, encoded });
        self.last_recorded_relative = Some(relative_ms);

        while self.snapshots.len() > self.max_snapshots {
            self.snapshots.pop_front();
        }

        if relative_ms.saturating_sub(self.last_swept_relative) >= SWEEP_INTERVAL.as_millis() as u64 {
            self.sweep(relative_ms);
        } else if self.snapshots.len() >= self.max_snapshots {
            // Overflow always triggers a sweep too, per spec.
            self.sweep(relative_ms);
        }
    }

    /// Drop every entry older than `retention` relative to `now_relative_ms`.
    fn sweep(&mut self, now_relative_ms: u64) {
        let cutoff = now_relative_ms.saturating_sub(self.retention.as_millis() as u64);
        while let Some(front) = self.snapshots.front() {
            if front.relative_ms < cutoff {
                self.snapshots.pop_front();
            } else {
                break;
            }
        }
        self.last_swept_relative = now_relative_ms;
    }

    /// Entries recorded at or after `from` (relative ms), in
    /// chronological order. `None` returns the full retained history.
    pub fn get_replay(&self, from: Option<u64>) -> Vec<Snapshot> {
        match from {
            Some(from) => self.snapshots.iter().filter(|s| s.relative_ms >= from).cloned().collect(),
            None => self.snapshots.iter().cloned().collect(),
        }
    }

    /// The latest retained snapshot with `relative_time <= relative_ms`.
    /// Returns `None` (`not_found`) once the retention sweep has pruned
    /// every candidate at or below that time — the lookup never
    /// searches past the retention cutoff (spec.md §8 scenario 6,
    /// recorded as an Open Question resolution in `DESIGN.md`).
    pub fn snapshot_at(&self, relative_ms: u64) -> Option<&Snapshot> {
        self.snapshots.iter().rev().find(|s| s.relative_ms <= relative_ms)
    }

    /// Aggregate counters for admin/debug inspection.
    pub fn stats(&self, now_ms: u64) -> ReplayStats {
        ReplayStats {
            count: self.snapshots.len(),
            start_time_ms: self.start_time_ms,
            runtime_ms: now_ms.saturating_sub(self.start_time_ms),
            memory_bytes: self.snapshots.iter().map(|s| s.encoded.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::MatchStatus;

    fn snap() -> FullStateSnapshot {
        FullStateSnapshot {
            tick: 0,
            status: MatchStatus::Active,
            players: vec![],
            projectiles: vec![],
            power_ups: vec![],
        }
    }

    #[test]
    fn sub_interval_records_are_discarded() {
        let mut ring = ReplayRing::new(10_000, Duration::from_secs(1800), Duration::from_millis(100), 0);
        ring.record(0, &snap());
        ring.record(50, &snap());
        assert_eq!(ring.get_replay(None).len(), 1);
        ring.record(100, &snap());
        assert_eq!(ring.get_replay(None).len(), 2);
    }

    #[test]
    fn snapshot_at_returns_latest_at_or_before() {
        let mut ring = ReplayRing::new(10_000, Duration::from_secs(1800), Duration::from_millis(100), 0);
        for t in [0, 100, 200, 300, 400, 500] {
            ring.record(t, &snap());
        }
        let hit = ring.snapshot_at(250).unwrap();
        assert_eq!(hit.relative_ms, 200);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut ring = ReplayRing::new(3, Duration::from_secs(1800), Duration::from_millis(10), 0);
        for t in [0, 10, 20, 30] {
            ring.record(t, &snap());
        }
        let all = ring.get_replay(None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].relative_ms, 10);
    }

    #[test]
    fn retention_sweep_prunes_beyond_cutoff() {
        let mut ring = ReplayRing::new(10_000, Duration::from_millis(300), Duration::from_millis(10), 0);
        for t in [0, 10, 20, 30] {
            ring.record(t, &snap());
        }
        ring.sweep(330);
        let all = ring.get_replay(None);
        assert!(all.iter().all(|s| s.relative_ms >= 30));
    }

    #[test]
    fn get_replay_filters_by_from() {
        let mut ring = ReplayRing::new(10_000, Duration::from_secs(1800), Duration::from_millis(10), 0);
        for t in [0, 10, 20, 30] {
            ring.record(t, &snap());
        }
        let from20 = ring.get_replay(Some(20));
        assert_eq!(from20.len(), 2);
    }
}
