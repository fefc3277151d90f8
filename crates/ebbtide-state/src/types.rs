//! The per-process scale record shared between autoscaler instances.

use serde::{Deserialize, Serialize};

/// Scale state for one managed process type.
///
/// The record is implicitly created with all-zero defaults on first read
/// and mutated only by the process state machine. `quieted_to` and
/// `quieted_at` describe a pending downscale and are always set or cleared
/// as a pair via [`ScaleState::begin_quietdown`] and
/// [`ScaleState::clear_quietdown`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScaleState {
    /// Last observed instance count for this process type.
    pub count: u32,
    /// Pending downscale target, if a quietdown is in progress.
    pub quieted_to: Option<u32>,
    /// Unix timestamp (seconds) when the quietdown was initiated.
    pub quieted_at: Option<u64>,
    /// Unix timestamp (seconds) of the last scale evaluation, reconciled
    /// across writers by taking the maximum observed value.
    pub updated_at: Option<u64>,
    /// Unix timestamp (seconds) since which `count` has been continuously
    /// above zero. Cleared when the count returns to zero.
    pub started_at: Option<u64>,
}

impl ScaleState {
    /// Whether a downscale is pending. Both halves of the quietdown pair
    /// must be present.
    pub fn quieting(&self) -> bool {
        self.quieted_to.is_some() && self.quieted_at.is_some()
    }

    /// Record a pending downscale to `to` instances, initiated at `at`.
    pub fn begin_quietdown(&mut self, to: u32, at: u64) {
        self.quieted_to = Some(to);
        self.quieted_at = Some(at);
    }

    /// Drop any pending downscale.
    pub fn clear_quietdown(&mut self) {
        self.quieted_to = None;
        self.quieted_at = None;
    }

    /// Advance `updated_at` to `now`, never regressing an already-newer
    /// value observed from a peer.
    pub fn touch(&mut self, now: u64) {
        self.updated_at = Some(self.updated_at.map_or(now, |at| at.max(now)));
    }

    /// Adopt a peer's record if it is newer than ours (last-writer-wins).
    ///
    /// Returns `true` when the remote record replaced the local one.
    pub fn adopt_newer(&mut self, remote: &ScaleState) -> bool {
        let newer = match (remote.updated_at, self.updated_at) {
            (Some(theirs), Some(ours)) => theirs > ours,
            (Some(_), None) => true,
            _ => false,
        };
        if newer {
            *self = remote.clone();
        }
        newer
    }
}
