//! Scale-decision strategies: backlog snapshot in, target instance count out.

use ebbtide_metrics::QueueSnapshot;
use serde::{Deserialize, Serialize};

/// Pure scale decision over a [`QueueSnapshot`].
///
/// Tagged by `mode` in configuration:
///
/// ```toml
/// scale = { mode = "linear", max_instances = 5, per_instance_capacity = 25 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScaleStrategy {
    /// All-or-nothing: `max_instances` while any work exists, zero otherwise.
    Binary {
        #[serde(default = "default_max_instances")]
        max_instances: u32,
    },
    /// Proportional: grow with backlog relative to per-instance capacity,
    /// optionally holding back until a minimum fraction of one instance's
    /// capacity is requested.
    Linear {
        #[serde(default = "default_max_instances")]
        max_instances: u32,
        #[serde(default = "default_per_instance_capacity")]
        per_instance_capacity: u32,
        #[serde(default)]
        min_factor: f64,
    },
}

fn default_max_instances() -> u32 {
    1
}

fn default_per_instance_capacity() -> u32 {
    25
}

impl Default for ScaleStrategy {
    fn default() -> Self {
        ScaleStrategy::Binary {
            max_instances: default_max_instances(),
        }
    }
}

impl ScaleStrategy {
    /// Target instance count for the given snapshot.
    pub fn target(&self, snapshot: &QueueSnapshot) -> u32 {
        match *self {
            ScaleStrategy::Binary { max_instances } => {
                if snapshot.has_work() {
                    max_instances
                } else {
                    0
                }
            }
            ScaleStrategy::Linear {
                max_instances,
                per_instance_capacity,
                min_factor,
            } => {
                let total_capacity = max_instances as f64 * per_instance_capacity as f64;
                if total_capacity == 0.0 {
                    return 0;
                }

                // Minimum capacity required before the first instance engages.
                // A negative factor clamps to zero.
                let min_capacity = min_factor.max(0.0) * per_instance_capacity as f64;
                let min_capacity_pct = min_capacity / total_capacity;
                let requested_pct = snapshot.total_work() as f64 / total_capacity;

                let mut scale_factor =
                    (requested_pct - min_capacity_pct) / (total_capacity - min_capacity_pct);
                if scale_factor.is_nan() {
                    scale_factor = 0.0;
                }

                let ideal = ((scale_factor * total_capacity).max(0.0) * max_instances as f64)
                    .ceil() as u32;

                // Never scale below the instances engaged in this snapshot;
                // the max cap wins when the two clamps conflict.
                ideal.max(snapshot.instances).min(max_instances)
            }
        }
    }
}
