//! Configuration errors and the pluggable transient-error sink.

use std::sync::Arc;

use thiserror::Error;

/// Fatal configuration problems, raised before the formation registry is
/// usable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("queue '{queue}' is watched by more than one process")]
    DuplicateQueue { queue: String },

    #[error("the '*' queue set must be exclusive to a single process")]
    WildcardConflict,

    #[error("process '{process}' mixes '*' with named queues")]
    MixedWildcard { process: String },

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config io error: {0}")]
    Io(String),
}

/// Sink for transient provider failures (fleet controller, metrics
/// source, shared store).
///
/// The control loop never propagates these: each call site reports the
/// failure here, falls back to a safe default, and retries on its next
/// throttle-gated tick. One handler serves the whole process tree.
pub type ErrorHandler = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

/// Default handler: log the failure and keep going.
pub fn log_error_handler() -> ErrorHandler {
    Arc::new(|err| tracing::error!(error = %err, "provider call failed"))
}
