//! Bounded undo/redo stacks of operation snapshots.
//!
//! Process-local state: a restart loses both stacks by design. The ledger
//! holds data only; applying a snapshot's inverse lives in the orchestration
//! layer, which pops here, mutates persistence, then files the snapshot on
//! the opposite stack. A pop that fails to apply must be handed back via
//! [`SnapshotLedger::reinstate`] so no entry is lost to a failed inverse.

use crate::domain::Snapshot;
use std::collections::VecDeque;

/// The two snapshot stacks with their shared capacity.
#[derive(Debug)]
pub struct SnapshotLedger {
    active: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotLedger {
    pub fn new(capacity: usize) -> Self {
        SnapshotLedger {
            active: VecDeque::new(),
            redo: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a fresh mutation. Clears the redo stack: once history diverges,
    /// the undone branch is unreachable. Past capacity the oldest active
    /// entry is trimmed, an accepted un-undoable horizon.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.redo.clear();
        self.active.push_back(snapshot);
        while self.active.len() > self.capacity {
            self.active.pop_front();
        }
    }

    /// Take the most recent mutation off the active stack for undoing.
    pub fn pop_active(&mut self) -> Option<Snapshot> {
        self.active.pop_back()
    }

    /// Take the most recently undone mutation off the redo stack.
    pub fn pop_redo(&mut self) -> Option<Snapshot> {
        self.redo.pop_back()
    }

    /// File an undone snapshot on the redo stack.
    pub fn push_redo(&mut self, snapshot: Snapshot) {
        self.redo.push_back(snapshot);
        while self.redo.len() > self.capacity {
            self.redo.pop_front();
        }
    }

    /// Return a snapshot to the active stack without disturbing the redo
    /// stack. Used when a redo completes, and when applying an inverse
    /// failed and the popped entry must go back where it was.
    pub fn reinstate(&mut self, snapshot: Snapshot) {
        self.active.push_back(snapshot);
        while self.active.len() > self.capacity {
            self.active.pop_front();
        }
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }
}
