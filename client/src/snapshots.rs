//! Bounded history of server snapshots used for interpolation.

use shared::Snapshot;
use std::collections::VecDeque;

/// Ring buffer of snapshots in arrival order.
pub struct SnapshotBuffer {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a snapshot to the buffer.
    ///
    /// If buffer is full, oldest snapshot is removed.
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn oldest(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Returns `(previous, target)`: the consecutive pair with
    /// `previous.time < time <= target.time`. When no pair brackets `time`
    /// both are the oldest snapshot.
    pub fn bracket(&self, time: f64) -> Option<(&Snapshot, &Snapshot)> {
        let oldest = self.snapshots.front()?;

        let pair = self
            .snapshots
            .iter()
            .zip(self.snapshots.iter().skip(1))
            .find(|(previous, target)| time > previous.time && time <= target.time);

        Some(pair.unwrap_or((oldest, oldest)))
    }
}
