//! The autoscaler facade: the two hooks an embedding application calls.
//!
//! `request_upscale` is meant for the job-enqueue path; `monitor_shutdown`
//! for a worker's startup path. Both are cheap and deduplicated, safe to
//! call on every job.

use std::sync::Arc;

use tracing::debug;

use crate::formation::Formation;
use crate::poller::Poller;

/// Entry surface over a [`Formation`] and its two pollers.
pub struct Autoscaler {
    formation: Formation,
    upscale: Poller,
    monitor: Poller,
}

impl Autoscaler {
    pub fn new(formation: Formation) -> Self {
        Self::with_pollers(formation, Poller::upscale(), Poller::shutdown_monitor())
    }

    /// Construct with custom pollers, mainly to tighten delays in tests.
    pub fn with_pollers(formation: Formation, upscale: Poller, monitor: Poller) -> Self {
        Self {
            formation,
            upscale,
            monitor,
        }
    }

    pub fn formation(&self) -> &Formation {
        &self.formation
    }

    /// A job landed on `queue`: poll the owning process up. Returns
    /// whether any process watches the queue.
    pub fn request_upscale(&self, queue: &str) -> bool {
        match self.formation.process_for_queue(queue) {
            Some(process) => {
                debug!(%queue, process = %process.id(), "upscale requested");
                self.upscale.submit(Arc::clone(process));
                true
            }
            None => false,
        }
    }

    /// A worker for `process_name` booted: watch it back down to zero
    /// once its backlog drains. Returns whether the process is known.
    pub fn monitor_shutdown(&self, process_name: &str) -> bool {
        match self.formation.process_by_name(process_name) {
            Some(process) => {
                debug!(process = %process.id(), "shutdown monitoring requested");
                self.monitor.submit(Arc::clone(process));
                true
            }
            None => false,
        }
    }

    /// Abandon all pending polls.
    pub fn stop(&self) {
        self.upscale.stop();
        self.monitor.stop();
    }
}
