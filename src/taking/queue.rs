use std::collections::VecDeque;

use serde::Serialize;

// Answer saves are fire-and-forget from the UI's perspective, but every
// write is tracked here so the app can tell whether anything is still in
// flight (or was lost) instead of silently trusting the network.

const RETAINED_ENTRIES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveState {
    Pending,
    Acknowledged,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntry {
    pub seq: u64,
    pub question_id: i64,
    pub state: SaveState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveQueueStatus {
    pub pending: usize,
    pub failed: usize,
    pub acknowledged: usize,
    pub drained: bool,
}

#[derive(Debug, Default)]
pub struct SaveQueue {
    next_seq: u64,
    entries: VecDeque<SaveEntry>,
    acknowledged_total: usize,
}

impl SaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an outgoing save and returns its sequence number.
    pub fn enqueue(&mut self, question_id: i64) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.entries.push_back(SaveEntry {
            seq,
            question_id,
            state: SaveState::Pending,
        });
        self.prune();
        seq
    }

    pub fn acknowledge(&mut self, seq: u64) {
        if self.set_state(seq, SaveState::Acknowledged) {
            self.acknowledged_total += 1;
        }
    }

    pub fn fail(&mut self, seq: u64) {
        self.set_state(seq, SaveState::Failed);
    }

    fn set_state(&mut self, seq: u64, state: SaveState) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.seq == seq) {
            entry.state = state;
            true
        } else {
            false
        }
    }

    fn prune(&mut self) {
        while self.entries.len() > RETAINED_ENTRIES {
            // Never drop an entry that is still awaiting its acknowledgement.
            match self.entries.front() {
                Some(entry) if entry.state != SaveState::Pending => {
                    self.entries.pop_front();
                }
                _ => break,
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == SaveState::Pending)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state == SaveState::Failed)
            .count()
    }

    /// True when no save is awaiting acknowledgement.
    pub fn is_drained(&self) -> bool {
        self.pending() == 0
    }

    pub fn status(&self) -> SaveQueueStatus {
        SaveQueueStatus {
            pending: self.pending(),
            failed: self.failed(),
            acknowledged: self.acknowledged_total,
            drained: self.is_drained(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.acknowledged_total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_pending_and_acknowledged_writes() {
        let mut queue = SaveQueue::new();
        let a = queue.enqueue(1);
        let b = queue.enqueue(2);
        assert_eq!(queue.pending(), 2);
        assert!(!queue.is_drained());

        queue.acknowledge(a);
        assert_eq!(queue.pending(), 1);
        queue.acknowledge(b);
        assert!(queue.is_drained());

        let status = queue.status();
        assert_eq!(status.acknowledged, 2);
        assert_eq!(status.failed, 0);
        assert!(status.drained);
    }

    #[test]
    fn failed_saves_are_counted_not_retried() {
        let mut queue = SaveQueue::new();
        let seq = queue.enqueue(7);
        queue.fail(seq);
        assert_eq!(queue.failed(), 1);
        // A failed write is settled: nothing is in flight any more.
        assert!(queue.is_drained());
    }

    #[test]
    fn unknown_sequence_numbers_are_ignored() {
        let mut queue = SaveQueue::new();
        queue.acknowledge(99);
        queue.fail(99);
        assert_eq!(queue.status().acknowledged, 0);
        assert_eq!(queue.failed(), 0);
    }

    #[test]
    fn pruning_never_drops_pending_entries() {
        let mut queue = SaveQueue::new();
        let first = queue.enqueue(0);
        for i in 1..200 {
            let seq = queue.enqueue(i);
            queue.acknowledge(seq);
        }
        // The oldest entry is still pending, so it must survive pruning.
        assert_eq!(queue.entries.front().unwrap().seq, first);
        assert_eq!(queue.pending(), 1);
    }
}
