//! State fan-out.
//!
//! One `StateBroadcaster` per match: pushes each tick's delta batch to
//! every subscriber, injects a periodic full-state keyframe so a late
//! joiner (or a subscriber that missed a frame) can resync without
//! replaying history, and compresses large frames. Grounded on the
//! teacher's `event_tx: broadcast::Sender<MatchEvent>` in
//! `network/session.rs` and `generate_state_update` building a wire
//! snapshot straight from `MatchState` fields — generalized into its
//! own owning type per spec.md §4.7.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::game::delta::DeltaBatch;
use crate::game::player::Player;
use crate::game::powerup::PowerUp;
use crate::game::projectile::Projectile;
use crate::game::state::{Match, MatchStatus};

/// A full point-in-time snapshot of a match, sent as a keyframe so a
/// subscriber never has to replay every delta since match start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FullStateSnapshot {
    /// The tick this snapshot was captured at.
    pub tick: u64,
    /// Match lifecycle phase at capture time.
    pub status: MatchStatus,
    /// Every connected player.
    pub players: Vec<Player>,
    /// Every live projectile.
    pub projectiles: Vec<Projectile>,
    /// Every power-up, active or not.
    pub power_ups: Vec<PowerUp>,
}

impl FullStateSnapshot {
    /// Capture a snapshot of `state` as it stands right now.
    pub fn capture(state: &Match) -> Self {
        Self {
            tick: state.tick_count,
            status: state.status,
            players: state.players.values().cloned().collect(),
            projectiles: state.projectiles.values().cloned().collect(),
            power_ups: state.power_ups.values().cloned().collect(),
        }
    }
}

/// One outbound wire frame (spec.md §6 `state_delta` / `state_full`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    /// An incremental update.
    Delta(DeltaBatch),
    /// A full-state keyframe.
    FullState(FullStateSnapshot),
}

/// A frame as sent over the wire: JSON, gzip-compressed above
/// `COMPRESS_THRESHOLD_BYTES`. The leading `compressed` flag tells a
/// receiver whether to inflate before parsing.
#[derive(Clone, Debug)]
pub struct EncodedFrame {
    /// `true` if `bytes` is gzip-compressed JSON.
    pub compressed: bool,
    /// The frame payload.
    pub bytes: Vec<u8>,
}

/// Frames larger than this are gzip-compressed before broadcast.
const COMPRESS_THRESHOLD_BYTES: usize = 4096;

/// A handle subscribers use to receive frames for one match.
pub type Subscription = broadcast::Receiver<Arc<EncodedFrame>>;

/// A handle a replay recorder uses to receive a raw (un-encoded,
/// uncompressed) snapshot every committed tick, independent of the
/// wire keyframe cadence.
pub type SnapshotSubscription = broadcast::Receiver<Arc<FullStateSnapshot>>;

/// Per-match subscriber set and keyframe scheduler.
pub struct StateBroadcaster {
    tx: broadcast::Sender<Arc<EncodedFrame>>,
    snapshot_tx: broadcast::Sender<Arc<FullStateSnapshot>>,
    last_full_state: Instant,
    full_state_interval: Duration,
}

impl StateBroadcaster {
    /// Construct a broadcaster that injects a full-state keyframe at
    /// least every `full_state_interval`.
    pub fn new(full_state_interval: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(256);
        let (snapshot_tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            snapshot_tx,
            last_full_state: Instant::now(),
            full_state_interval,
        }
    }

    /// Subscribe to this match's frame stream.
    pub fn subscribe(&self) -> Subscription {
        self.tx.subscribe()
    }

    /// Subscribe to a raw snapshot emitted every committed tick,
    /// regardless of the wire keyframe cadence — this is what feeds a
    /// [`crate::spectator::SpectatorRoom`]'s replay ring (spec.md §4.8
    /// "on every committed broadcast the room appends ... to the
    /// replay ring").
    pub fn subscribe_snapshots(&self) -> SnapshotSubscription {
        self.snapshot_tx.subscribe()
    }

    /// Current subscriber count (dead receivers are dropped by `tokio`
    /// automatically; this never counts one that has been dropped).
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish one committed tick: a raw snapshot to every replay
    /// recorder, a full-state keyframe to wire subscribers if due,
    /// then the tick's delta batch (skipped if empty and no keyframe
    /// was sent — an idle tick produces nothing further to send).
    /// `capture` is only invoked once per tick that anyone (a wire
    /// subscriber or a replay recorder) is listening.
    pub fn publish_tick(&mut self, batch: DeltaBatch, capture: impl FnOnce() -> FullStateSnapshot) {
        let wire_subscribers = self.subscriber_count() > 0;
        let recorders = self.snapshot_tx.receiver_count() > 0;
        if !wire_subscribers && !recorders {
            return;
        }

        let snapshot = if self.last_full_state.elapsed() >= self.full_state_interval || recorders {
            Some(Arc::new(capture()))
        } else {
            None
        };

        if recorders {
            if let Some(snapshot) = &snapshot {
                let _ = self.snapshot_tx.send(snapshot.clone());
            }
        }

        if !wire_subscribers {
            return;
        }
        if self.last_full_state.elapsed() >= self.full_state_interval {
            let snapshot = snapshot.expect("captured above when interval elapsed");
            self.send(Frame::FullState((*snapshot).clone()));
            self.last_full_state = Instant::now();
        }
        if !batch.records.is_empty() {
            self.send(Frame::Delta(batch));
        }
    }

    /// Force an immediate full-state keyframe (used when a new
    /// spectator joins mid-match and needs to resync right away).
    pub fn send_full_state(&mut self, snapshot: FullStateSnapshot) {
        self.send(Frame::FullState(snapshot));
        self.last_full_state = Instant::now();
    }

    fn send(&self, frame: Frame) {
        let encoded = encode_frame(&frame);
        // No receivers is not an error: a match can run with zero
        // spectators/late subscribers for a tick.
        let _ = self.tx.send(Arc::new(encoded));
    }
}

/// Merge a run of delta batches into one, preserving create/destroy/
/// join/leave/event ordering and letting each id's last field-update
/// record in the run win (spec.md §4.7 "later write wins per field").
/// Used when a slow consumer needs to catch up across several ticks at
/// once instead of draining them one at a time.
pub fn compact_batches(batches: Vec<DeltaBatch>) -> DeltaBatch {
    use crate::game::delta::DeltaRecord;
    use std::collections::BTreeMap;

    let tick = batches.last().map(|b| b.tick).unwrap_or(0);
    let mut ordered = Vec::new();
    let mut player_updates: BTreeMap<crate::core::PlayerId, usize> = BTreeMap::new();
    let mut projectile_updates: BTreeMap<u64, usize> = BTreeMap::new();

    for batch in batches {
        for record in batch.records {
            match record {
                DeltaRecord::PlayerUpdated { player_id, changes } => {
                    if let Some(&slot) = player_updates.get(&player_id) {
                        let DeltaRecord::PlayerUpdated { changes: existing, .. } = &mut ordered[slot] else {
                            unreachable!("slot recorded for a PlayerUpdated record")
                        };
                        existing.merge(changes);
                    } else {
                        player_updates.insert(player_id.clone(), ordered.len());
                        ordered.push(DeltaRecord::PlayerUpdated { player_id, changes });
                    }
                }
                DeltaRecord::ProjectileUpdated { projectile_id, changes } => {
                    if let Some(&slot) = projectile_updates.get(&projectile_id) {
                        let DeltaRecord::ProjectileUpdated { changes: existing, .. } = &mut ordered[slot] else {
                            unreachable!("slot recorded for a ProjectileUpdated record")
                        };
                        existing.merge(changes);
                    } else {
                        projectile_updates.insert(projectile_id, ordered.len());
                        ordered.push(DeltaRecord::ProjectileUpdated { projectile_id, changes });
                    }
                }
                other => ordered.push(other),
            }
        }
    }

    DeltaBatch { tick, records: ordered }
}

fn encode_frame(frame: &Frame) -> EncodedFrame {
    let json = serde_json::to_vec(frame).unwrap_or_default();
    if json.len() > COMPRESS_THRESHOLD_BYTES {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(&json).is_ok() {
            if let Ok(compressed) = encoder.finish() {
                return EncodedFrame { compressed: true, bytes: compressed };
            }
        }
    }
    EncodedFrame { compressed: false, bytes: json }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MatchId, PlayerId, WorldBounds};
    use crate::game::delta::{DeltaRecord, PlayerFieldChanges};

    #[test]
    fn idle_tick_with_no_subscribers_sends_nothing() {
        let mut b = StateBroadcaster::new(Duration::from_secs(5));
        b.publish_tick(DeltaBatch { tick: 1, records: vec![] }, || {
            panic!("capture should not be called without subscribers")
        });
    }

    #[tokio::test]
    async fn replay_recorder_gets_a_snapshot_every_tick_regardless_of_keyframe_cadence() {
        // A long full_state_interval means no wire keyframe would be
        // due for a long time, but a replay recorder still needs one
        // per tick (spec.md §4.8).
        let mut b = StateBroadcaster::new(Duration::from_secs(999));
        let mut snapshots = b.subscribe_snapshots();
        for tick in 1..=3u64 {
            b.publish_tick(DeltaBatch { tick, records: vec![] }, || empty_snapshot_at(tick));
        }
        let first = snapshots.recv().await.unwrap();
        let second = snapshots.recv().await.unwrap();
        let third = snapshots.recv().await.unwrap();
        assert_eq!((first.tick, second.tick, third.tick), (1, 2, 3));
    }

    fn empty_snapshot_at(tick: u64) -> FullStateSnapshot {
        FullStateSnapshot {
            tick,
            status: MatchStatus::Waiting,
            players: vec![],
            projectiles: vec![],
            power_ups: vec![],
        }
    }

    #[tokio::test]
    async fn subscriber_receives_delta_frame() {
        let mut b = StateBroadcaster::new(Duration::from_secs(999));
        let mut sub = b.subscribe();
        let batch = DeltaBatch {
            tick: 1,
            records: vec![DeltaRecord::PlayerLeft { player_id: PlayerId::new("a") }],
        };
        b.publish_tick(batch, empty_snapshot);
        let frame = sub.recv().await.unwrap();
        assert!(!frame.bytes.is_empty());
    }

    fn empty_snapshot() -> FullStateSnapshot {
        FullStateSnapshot {
            tick: 0,
            status: MatchStatus::Waiting,
            players: vec![],
            projectiles: vec![],
            power_ups: vec![],
        }
    }

    #[test]
    fn compact_batches_keeps_last_write_per_player() {
        let id = PlayerId::new("a");
        let b1 = DeltaBatch {
            tick: 1,
            records: vec![DeltaRecord::PlayerUpdated {
                player_id: id.clone(),
                changes: PlayerFieldChanges { health: Some(80), ..Default::default() },
            }],
        };
        let b2 = DeltaBatch {
            tick: 2,
            records: vec![DeltaRecord::PlayerUpdated {
                player_id: id.clone(),
                changes: PlayerFieldChanges { health: Some(60), ..Default::default() },
            }],
        };
        let merged = compact_batches(vec![b1, b2]);
        assert_eq!(merged.tick, 2);
        assert_eq!(merged.records.len(), 1);
        match &merged.records[0] {
            DeltaRecord::PlayerUpdated { changes, .. } => assert_eq!(changes.health, Some(60)),
            _ => panic!("expected PlayerUpdated"),
        }
    }

    #[test]
    fn compact_batches_merges_distinct_fields_across_batches() {
        let id = PlayerId::new("a");
        let b1 = DeltaBatch {
            tick: 1,
            records: vec![DeltaRecord::PlayerUpdated {
                player_id: id.clone(),
                changes: PlayerFieldChanges { health: Some(80), ..Default::default() },
            }],
        };
        let b2 = DeltaBatch {
            tick: 2,
            records: vec![DeltaRecord::PlayerUpdated {
                player_id: id.clone(),
                changes: PlayerFieldChanges { mana: Some(40), ..Default::default() },
            }],
        };
        let merged = compact_batches(vec![b1, b2]);
        assert_eq!(merged.records.len(), 1);
        match &merged.records[0] {
            DeltaRecord::PlayerUpdated { changes, .. } => {
                assert_eq!(changes.health, Some(80));
                assert_eq!(changes.mana, Some(40));
            }
            _ => panic!("expected PlayerUpdated"),
        }
    }

    #[test]
    fn capture_reflects_live_match() {
        let m = Match::new(MatchId::generate(), WorldBounds::new(100.0, 100.0), 2, 4, None, None);
        let snapshot = FullStateSnapshot::capture(&m);
        assert_eq!(snapshot.tick, 0);
        assert!(snapshot.players.is_empty());
    }
}
