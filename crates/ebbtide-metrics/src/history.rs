//! Bounded rolling window of backlog snapshots for live display.
//!
//! This is deliberately not a time-series store: the window is a fixed
//! capacity in memory, never persisted, and exists only so a display
//! surface can chart recent backlog.

use std::collections::VecDeque;

use serde::Serialize;

use crate::queues::QueueSnapshot;

/// One timestamped measurement in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryPoint {
    /// Unix timestamp (seconds) of the measurement.
    pub epoch: u64,
    pub snapshot: QueueSnapshot,
}

/// Fixed-capacity rolling window, oldest entries evicted first.
#[derive(Debug)]
pub struct MetricsHistory {
    capacity: usize,
    entries: VecDeque<HistoryPoint>,
}

impl MetricsHistory {
    /// Default window: an hour of measurements at the default 10s
    /// throttle cadence.
    pub const DEFAULT_CAPACITY: usize = 360;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, epoch: u64, snapshot: QueueSnapshot) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryPoint { epoch, snapshot });
    }

    /// All retained points, oldest first.
    pub fn recent(&self) -> Vec<HistoryPoint> {
        self.entries.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<HistoryPoint> {
        self.entries.back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(enqueued: u64) -> QueueSnapshot {
        QueueSnapshot {
            enqueued,
            ..Default::default()
        }
    }

    #[test]
    fn records_in_order() {
        let mut history = MetricsHistory::new(10);
        history.record(1, snap(1));
        history.record(2, snap(2));

        let recent = history.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].epoch, 1);
        assert_eq!(recent[1].epoch, 2);
        assert_eq!(history.latest().unwrap().snapshot.enqueued, 2);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut history = MetricsHistory::new(3);
        for epoch in 1..=5 {
            history.record(epoch, snap(epoch));
        }

        let recent = history.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].epoch, 3);
        assert_eq!(recent[2].epoch, 5);
    }

    #[test]
    fn zero_capacity_records_nothing() {
        let mut history = MetricsHistory::new(0);
        history.record(1, snap(1));
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);
    }
}
