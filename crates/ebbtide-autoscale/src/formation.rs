//! The formation registry: every managed process, indexed by queue.
//!
//! Built once from configuration. Queue ownership is exclusive — a queue
//! routes upscale requests to exactly one process, and the `"*"` wildcard
//! only coexists with itself.

use std::collections::HashMap;
use std::sync::Arc;

use ebbtide_metrics::{MetricsSource, QueueMetrics};
use ebbtide_state::{SharedStore, StateRepository};
use tracing::info;

use crate::config::AutoscaleConfig;
use crate::error::{ConfigError, ErrorHandler};
use crate::fleet::FleetController;
use crate::process::ScaleProcess;

/// Immutable registry of scale processes for one application.
pub struct Formation {
    by_queue: HashMap<String, Arc<ScaleProcess>>,
    by_name: HashMap<String, Arc<ScaleProcess>>,
}

impl Formation {
    /// Build the formation, validating queue-ownership exclusivity.
    pub fn build(
        config: &AutoscaleConfig,
        fleet: Arc<dyn FleetController>,
        source: Arc<dyn MetricsSource>,
        store: Arc<dyn SharedStore>,
        on_error: ErrorHandler,
    ) -> Result<Self, ConfigError> {
        let repo = StateRepository::new(store);
        let mut by_queue: HashMap<String, Arc<ScaleProcess>> = HashMap::new();
        let mut by_name: HashMap<String, Arc<ScaleProcess>> = HashMap::new();

        for (name, process_config) in &config.processes {
            let watch = process_config.queue_set(name)?;
            let metrics = QueueMetrics::new(
                watch.clone(),
                process_config.include_scheduled,
                process_config.include_retrying,
                source.clone(),
            );
            let process = Arc::new(
                ScaleProcess::new(
                    config.app_name.clone(),
                    name.clone(),
                    metrics,
                    process_config.scale.clone(),
                    fleet.clone(),
                    repo.clone(),
                )
                .with_throttle(process_config.throttle())
                .with_quiet_buffer(process_config.quiet_buffer())
                .with_minimum_uptime(process_config.minimum_uptime())
                .with_error_handler(on_error.clone()),
            );

            for key in watch.ownership_keys() {
                if by_queue.contains_key(&key) {
                    return Err(ConfigError::DuplicateQueue { queue: key });
                }
                // The wildcard owns everything, so it tolerates no
                // neighbors in either direction.
                if key == "*" && !by_queue.is_empty() || by_queue.contains_key("*") {
                    return Err(ConfigError::WildcardConflict);
                }
                by_queue.insert(key, process.clone());
            }
            by_name.insert(name.clone(), process);
        }

        info!(
            app = %config.app_name,
            processes = by_name.len(),
            queues = by_queue.len(),
            "formation built"
        );
        Ok(Self { by_queue, by_name })
    }

    /// Process watching `queue`, falling back to the wildcard owner.
    pub fn process_for_queue(&self, queue: &str) -> Option<&Arc<ScaleProcess>> {
        self.by_queue.get(queue).or_else(|| self.by_queue.get("*"))
    }

    pub fn process_by_name(&self, name: &str) -> Option<&Arc<ScaleProcess>> {
        self.by_name.get(name)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Arc<ScaleProcess>> {
        self.by_name.values()
    }

    pub fn process_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut queues: Vec<String> = self.by_queue.keys().cloned().collect();
        queues.sort();
        queues
    }
}
