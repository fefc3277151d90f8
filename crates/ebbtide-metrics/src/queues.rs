//! Backlog measurement and quietdown fan-out for a watched queue set.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use crate::error::MetricsResult;
use crate::history::MetricsHistory;
use crate::source::{MetricsSource, QueueSet, WorkerInstance};

/// Point-in-time backlog measurement for a watched queue set.
///
/// Derived, never persisted. The strategy layer consumes this and nothing
/// else, which keeps scale decisions pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueSnapshot {
    /// Jobs waiting in the watched queues.
    pub enqueued: u64,
    /// Jobs scheduled for later execution (zero when excluded by config).
    pub scheduled: u64,
    /// Jobs awaiting retry (zero when excluded by config).
    pub retrying: u64,
    /// Workers currently executing jobs.
    pub active_workers: u64,
    /// Live instances consuming from the watched queues.
    pub instances: u32,
}

impl QueueSnapshot {
    /// Outstanding work: backlog plus in-flight jobs.
    pub fn total_work(&self) -> u64 {
        self.enqueued + self.scheduled + self.retrying + self.active_workers
    }

    pub fn has_work(&self) -> bool {
        self.total_work() > 0
    }
}

/// Measures backlog for a watched queue set and signals excess instances
/// to quiet ahead of a downscale.
pub struct QueueMetrics {
    watch: QueueSet,
    include_scheduled: bool,
    include_retrying: bool,
    source: Arc<dyn MetricsSource>,
    history: Mutex<MetricsHistory>,
}

impl QueueMetrics {
    pub fn new(
        watch: QueueSet,
        include_scheduled: bool,
        include_retrying: bool,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        Self {
            watch,
            include_scheduled,
            include_retrying,
            source,
            history: Mutex::new(MetricsHistory::default()),
        }
    }

    pub fn watch(&self) -> &QueueSet {
        &self.watch
    }

    pub fn enqueued(&self) -> MetricsResult<u64> {
        self.source.enqueued_count(&self.watch)
    }

    /// Scheduled jobs, forced to zero when excluded by configuration.
    pub fn scheduled(&self) -> MetricsResult<u64> {
        if !self.include_scheduled {
            return Ok(0);
        }
        self.source.scheduled_count(&self.watch)
    }

    /// Retrying jobs, forced to zero when excluded by configuration.
    pub fn retrying(&self) -> MetricsResult<u64> {
        if !self.include_retrying {
            return Ok(0);
        }
        self.source.retrying_count(&self.watch)
    }

    pub fn active_workers(&self) -> MetricsResult<u64> {
        self.source.active_worker_count(&self.watch)
    }

    /// Live instance count for the watched queues.
    pub fn instance_count(&self) -> MetricsResult<u32> {
        Ok(self.source.list_instances(&self.watch)?.len() as u32)
    }

    pub fn total_work(&self) -> MetricsResult<u64> {
        Ok(self.snapshot()?.total_work())
    }

    pub fn has_work(&self) -> MetricsResult<bool> {
        Ok(self.snapshot()?.has_work())
    }

    /// Measure everything at once and record the result into the rolling
    /// history window.
    pub fn snapshot(&self) -> MetricsResult<QueueSnapshot> {
        let snapshot = QueueSnapshot {
            enqueued: self.enqueued()?,
            scheduled: self.scheduled()?,
            retrying: self.retrying()?,
            active_workers: self.active_workers()?,
            instances: self.instance_count()?,
        };
        self.history.lock().unwrap().record(epoch_secs(), snapshot);
        Ok(snapshot)
    }

    /// Recent snapshots for live display (oldest first).
    pub fn history(&self) -> Vec<crate::history::HistoryPoint> {
        self.history.lock().unwrap().recent()
    }

    /// Tell every instance beyond `target_instances` to stop accepting
    /// work.
    ///
    /// Instances are grouped by logical type (the identity prefix before a
    /// trailing `.{index}`) and ordered by that numeric suffix, so the
    /// newest instances of each type are the ones quieted. Instances that
    /// are already stopping are skipped, making repeated calls idempotent.
    ///
    /// Returns whether any instance's state actually changed this call.
    pub fn quiet_down(&self, target_instances: u32) -> MetricsResult<bool> {
        let instances = self.source.list_instances(&self.watch)?;

        let mut by_type: BTreeMap<String, Vec<(u32, WorkerInstance)>> = BTreeMap::new();
        for instance in instances {
            let (kind, index) = split_instance_id(&instance.id);
            by_type.entry(kind.to_string()).or_default().push((index, instance));
        }

        let mut changed = false;
        for (kind, mut group) in by_type {
            group.sort_by(|(a_idx, a), (b_idx, b)| a_idx.cmp(b_idx).then(a.id.cmp(&b.id)));
            for (position, (_, instance)) in group.iter().enumerate() {
                if (position as u32) < target_instances || instance.stopping {
                    continue;
                }
                self.source.quiet(&instance.id)?;
                debug!(instance = %instance.id, %kind, target_instances, "instance quieted");
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// Split `worker.3` into `("worker", 3)`. Identities without a numeric
/// suffix sort first within their type.
fn split_instance_id(id: &str) -> (&str, u32) {
    match id.rsplit_once('.') {
        Some((kind, suffix)) => match suffix.parse::<u32>() {
            Ok(index) => (kind, index),
            Err(_) => (id, 0),
        },
        None => (id, 0),
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
