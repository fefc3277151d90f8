//! The external queue-metrics interface consumed by [`crate::QueueMetrics`].

use serde::{Deserialize, Serialize};

use crate::error::MetricsResult;

/// The set of queues a process type is responsible for.
///
/// `All` corresponds to the `"*"` wildcard in configuration and may only
/// be claimed by one process when no other process claims a named queue
/// (enforced at formation build time, not here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueSet {
    /// Watch every queue.
    All,
    /// Watch the named queues only.
    Named(Vec<String>),
}

impl QueueSet {
    /// Build a named set, deduplicating while preserving first-seen order.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = Vec::new();
        for name in names {
            let name = name.into();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        QueueSet::Named(seen)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, QueueSet::All)
    }

    /// Whether `queue` falls inside this set.
    pub fn contains(&self, queue: &str) -> bool {
        match self {
            QueueSet::All => true,
            QueueSet::Named(names) => names.iter().any(|n| n == queue),
        }
    }

    /// Queue-ownership keys for the formation registry: the wildcard set
    /// claims the single `"*"` key.
    pub fn ownership_keys(&self) -> Vec<String> {
        match self {
            QueueSet::All => vec!["*".to_string()],
            QueueSet::Named(names) => names.clone(),
        }
    }
}

/// A live worker instance reported by the metrics source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInstance {
    /// Instance identity, conventionally `{type}.{index}` (e.g. `worker.2`).
    pub id: String,
    /// Queues this instance consumes from.
    pub queues: Vec<String>,
    /// Whether the instance has already been told to stop accepting work.
    pub stopping: bool,
}

/// External source of queue depth and worker activity.
///
/// Implementations wrap the concrete job-framework API. All methods are
/// scoped to the given queue set; queues with no backing data count as
/// zero.
pub trait MetricsSource: Send + Sync {
    /// Jobs waiting in the watched queues.
    fn enqueued_count(&self, queues: &QueueSet) -> MetricsResult<u64>;

    /// Jobs scheduled for future execution against the watched queues.
    fn scheduled_count(&self, queues: &QueueSet) -> MetricsResult<u64>;

    /// Jobs awaiting retry against the watched queues.
    fn retrying_count(&self, queues: &QueueSet) -> MetricsResult<u64>;

    /// Workers currently executing jobs from the watched queues.
    fn active_worker_count(&self, queues: &QueueSet) -> MetricsResult<u64>;

    /// Live instances consuming from the watched queues.
    fn list_instances(&self, queues: &QueueSet) -> MetricsResult<Vec<WorkerInstance>>;

    /// Tell one instance to stop accepting new work.
    fn quiet(&self, instance_id: &str) -> MetricsResult<()>;
}
