//! Error types for queue metrics operations.

use thiserror::Error;

/// Result type alias for metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised by the external queue-metrics source.
///
/// These are transient provider failures: callers recover locally by
/// falling back to zero backlog rather than propagating.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics source request failed: {0}")]
    Source(String),

    #[error("quiet signal failed for instance {id}: {reason}")]
    Quiet { id: String, reason: String },
}
