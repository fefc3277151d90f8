//! ebbtide-metrics — how much work is outstanding, and who is on it.
//!
//! [`QueueMetrics`] measures backlog and worker activity for a watched
//! queue set through the [`MetricsSource`] interface (the concrete queue
//! API lives outside this crate), and can signal excess worker instances
//! to stop accepting work ahead of a downscale.
//!
//! Missing or empty backing data always reads as zero — absent queues are
//! a normal condition, not an error. A bounded [`MetricsHistory`] keeps a
//! rolling window of recent snapshots for live display only.

pub mod error;
pub mod history;
pub mod queues;
pub mod source;

pub use error::{MetricsError, MetricsResult};
pub use history::{HistoryPoint, MetricsHistory};
pub use queues::{QueueMetrics, QueueSnapshot};
pub use source::{MetricsSource, QueueSet, WorkerInstance};
