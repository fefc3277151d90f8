//! The fleet-controller interface the scale state machine drives.

use thiserror::Error;

/// Result type alias for fleet-controller calls.
pub type FleetResult<T> = Result<T, FleetError>;

/// Failures talking to the scaling provider.
///
/// Treated as "no information": callers fall back to the last-known
/// count and route the error to the configured handler.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("fleet controller request failed: {0}")]
    Request(String),

    #[error("fleet controller authorization failed: {0}")]
    Unauthorized(String),
}

/// External control surface for provisioning worker instances.
///
/// Implementations wrap the concrete provider REST client. Setting the
/// same count twice must be harmless — the control loop relies on
/// idempotency rather than mutual exclusion between racing writers.
pub trait FleetController: Send + Sync {
    /// Total instances currently provisioned for `process` in `app`.
    fn list_count(&self, app: &str, process: &str) -> FleetResult<u32>;

    /// Provision exactly `quantity` instances for `process` in `app`.
    fn set_count(&self, app: &str, process: &str, quantity: u32) -> FleetResult<()>;
}
