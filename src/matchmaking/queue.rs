//! Per-(mode, region) FIFO queues.
//!
//! Grounded on the teacher's `QueueEntry` / `matchmaking_queue: Vec<QueueEntry>`
//! in `network/server.rs`, generalized from a single flat `Vec` into
//! `BTreeMap`-keyed buckets per spec.md §4.10 ("Per-(mode, region) queue
//! of entries").

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::PlayerId;

/// One player's place in line (spec.md §3 "Queue entry").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEntry {
    /// The waiting player.
    pub player_id: PlayerId,
    /// Skill rating at time of enqueue (re-snapshotted, not live-updated,
    /// so a mid-queue rating change from another match doesn't reshuffle
    /// this entry's tolerance math mid-wait).
    pub rating: f64,
    /// Measured latency to the candidate region's host, in ms.
    pub latency_ms: u32,
    /// Requested game mode.
    pub mode: String,
    /// Requested region.
    pub region: String,
    /// When this entry joined the queue (ms, process-relative).
    pub joined_at_ms: u64,
}

impl QueueEntry {
    /// Elapsed wait in whole seconds as of `now_ms`.
    pub fn wait_seconds(&self, now_ms: u64) -> f64 {
        now_ms.saturating_sub(self.joined_at_ms) as f64 / 1000.0
    }
}

/// Status of a player's queue membership (spec.md §4.10 `status`).
#[derive(Clone, Debug, PartialEq)]
pub enum QueueStatus {
    /// Currently queued, with FIFO position (0-based within its bucket)
    /// and elapsed wait.
    Queued {
        /// 0-based position within the (mode, region) bucket.
        position: usize,
        /// Elapsed wait in ms.
        wait_ms: u64,
    },
    /// Not in any queue.
    NotQueued,
}

/// The full set of per-(mode, region) FIFO buckets.
#[derive(Default)]
pub struct QueueTable {
    buckets: BTreeMap<(String, String), VecDeque<QueueEntry>>,
}

impl QueueTable {
    /// Construct an empty table.
    pub fn new() -> Self {
        Self { buckets: BTreeMap::new() }
    }

    /// Insert `entry` at the back of its (mode, region) bucket. Returns
    /// `false` (no-op) if the player is already queued anywhere
    /// (spec.md §4.10 "reject duplicate enqueues").
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        if self.position_of(&entry.player_id).is_some() {
            return false;
        }
        self.buckets
            .entry((entry.mode.clone(), entry.region.clone()))
            .or_default()
            .push_back(entry);
        true
    }

    /// Remove a player from whichever bucket holds them. No-op, not an
    /// error, if they aren't queued (spec.md §4.10 `dequeue`).
    pub fn dequeue(&mut self, player_id: &PlayerId) -> Option<QueueEntry> {
        for bucket in self.buckets.values_mut() {
            if let Some(idx) = bucket.iter().position(|e| &e.player_id == player_id) {
                return bucket.remove(idx);
            }
        }
        None
    }

    fn position_of(&self, player_id: &PlayerId) -> Option<((String, String), usize)> {
        for (key, bucket) in &self.buckets {
            if let Some(idx) = bucket.iter().position(|e| &e.player_id == player_id) {
                return Some((key.clone(), idx));
            }
        }
        None
    }

    /// Current status for a player (spec.md §4.10 `status`).
    pub fn status(&self, player_id: &PlayerId, now_ms: u64) -> QueueStatus {
        match self.position_of(player_id) {
            Some((key, position)) => {
                let joined_at = self.buckets[&key][position].joined_at_ms;
                QueueStatus::Queued { position, wait_ms: now_ms.saturating_sub(joined_at) }
            }
            None => QueueStatus::NotQueued,
        }
    }

    /// Every (mode, region) bucket, ordered by key, mutable for the
    /// matcher's pairing pass.
    pub fn buckets_mut(&mut self) -> impl Iterator<Item = (&(String, String), &mut VecDeque<QueueEntry>)> {
        self.buckets.iter_mut()
    }

    /// Drop every entry whose wait has exceeded `timeout_ms`, returning
    /// the removed entries (spec.md §4.10 "queued -> expired").
    pub fn evict_expired(&mut self, now_ms: u64, timeout_ms: u64) -> Vec<QueueEntry> {
        let mut expired = Vec::new();
        for bucket in self.buckets.values_mut() {
            let mut i = 0;
            while i < bucket.len() {
                if now_ms.saturating_sub(bucket[i].joined_at_ms) >= timeout_ms {
                    expired.push(bucket.remove(i).unwrap());
                } else {
                    i += 1;
                }
            }
        }
        expired
    }

    /// Total number of queued entries across every bucket.
    pub fn len(&self) -> usize {
        self.buckets.values().map(VecDeque::len).sum()
    }

    /// `true` if no bucket holds any entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, mode: &str, region: &str, joined_at_ms: u64) -> QueueEntry {
        QueueEntry {
            player_id: PlayerId::new(id),
            rating: 1200.0,
            latency_ms: 40,
            mode: mode.into(),
            region: region.into(),
            joined_at_ms,
        }
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let mut q = QueueTable::new();
        assert!(q.enqueue(entry("a", "1v1", "na_east", 0)));
        assert!(!q.enqueue(entry("a", "1v1", "na_east", 10)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn dequeue_missing_player_is_noop() {
        let mut q = QueueTable::new();
        assert!(q.dequeue(&PlayerId::new("ghost")).is_none());
    }

    #[test]
    fn status_reports_position_and_wait() {
        let mut q = QueueTable::new();
        q.enqueue(entry("a", "1v1", "na_east", 0));
        q.enqueue(entry("b", "1v1", "na_east", 5));
        match q.status(&PlayerId::new("b"), 100) {
            QueueStatus::Queued { position, wait_ms } => {
                assert_eq!(position, 1);
                assert_eq!(wait_ms, 95);
            }
            QueueStatus::NotQueued => panic!("expected queued"),
        }
    }

    #[test]
    fn evict_expired_removes_only_timed_out_entries() {
        let mut q = QueueTable::new();
        q.enqueue(entry("a", "1v1", "na_east", 0));
        q.enqueue(entry("b", "1v1", "na_east", 29_000));
        let expired = q.evict_expired(30_000, 30_000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].player_id, PlayerId::new("a"));
        assert_eq!(q.len(), 1);
    }
}
