//! Shared polling engine behind the two autoscaler entry points.
//!
//! A [`Poller`] holds a map of pending requests and at most one tokio
//! task draining it. Submitting a request (re)spawns the task if the
//! previous one finished; the task probes every pending process each
//! cycle, drops the resolved ones, and exits when the map empties. The
//! probe itself decides what "resolved" means.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::process::ScaleProcess;

/// What a poll cycle asks of each pending process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Resolve once a scale evaluation has run since the request.
    Upscale,
    /// Resolve once the process is fully scaled down.
    Shutdown,
}

struct Pending {
    process: Arc<ScaleProcess>,
    requested_at: u64,
}

/// Deduplicating poll loop over a set of [`ScaleProcess`]es.
pub struct Poller {
    probe: Probe,
    before_delay: Duration,
    after_delay: Duration,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(probe: Probe, before_delay: Duration, after_delay: Duration) -> Self {
        Self {
            probe,
            before_delay,
            after_delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            worker: Mutex::new(None),
        }
    }

    /// Upscale poller: probe immediately, then pause between cycles so a
    /// burst of requests collapses into one evaluation per throttle window.
    pub fn upscale() -> Self {
        Self::new(Probe::Upscale, Duration::ZERO, Duration::from_secs(1))
    }

    /// Shutdown monitor: delay the first probe so a process that is about
    /// to pick up work is not torn down while it boots.
    pub fn shutdown_monitor() -> Self {
        Self::new(Probe::Shutdown, Duration::from_secs(10), Duration::ZERO)
    }

    /// Register `process` for polling. Re-submitting refreshes the request
    /// time; the process is only ever probed once per cycle.
    pub fn submit(&self, process: Arc<ScaleProcess>) {
        let id = process.id();
        self.pending.lock().unwrap().insert(
            id,
            Pending {
                process,
                requested_at: epoch_secs(),
            },
        );
        self.ensure_worker();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_count() == 0
    }

    /// Drop all pending requests and abort the poll task if one is live.
    pub fn stop(&self) {
        self.pending.lock().unwrap().clear();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            handle.abort();
        }
    }

    fn ensure_worker(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let probe = self.probe;
        let before = self.before_delay;
        let after = self.after_delay;
        let pending = self.pending.clone();
        *worker = Some(tokio::spawn(async move {
            run_poll_loop(probe, before, after, pending).await;
        }));
    }
}

async fn run_poll_loop(
    probe: Probe,
    before_delay: Duration,
    after_delay: Duration,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
) {
    loop {
        if !before_delay.is_zero() {
            tokio::time::sleep(before_delay).await;
        }

        let batch: Vec<(String, Arc<ScaleProcess>, u64)> = {
            let pending = pending.lock().unwrap();
            pending
                .iter()
                .map(|(id, p)| (id.clone(), p.process.clone(), p.requested_at))
                .collect()
        };
        if batch.is_empty() {
            break;
        }

        for (id, process, requested_at) in batch {
            let resolved = match probe {
                Probe::Upscale => process.wait_for_update(requested_at),
                Probe::Shutdown => process.wait_for_shutdown(),
            };
            if resolved {
                debug!(process = %id, ?probe, "poll resolved");
                pending.lock().unwrap().remove(&id);
            }
        }

        if pending.lock().unwrap().is_empty() {
            break;
        }
        if !after_delay.is_zero() {
            tokio::time::sleep(after_delay).await;
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{FleetController, FleetResult};
    use crate::strategy::ScaleStrategy;
    use ebbtide_metrics::{MetricsResult, MetricsSource, QueueMetrics, QueueSet, WorkerInstance};
    use ebbtide_state::{MemoryStore, StateRepository};
    use std::sync::Mutex as StdMutex;

    struct FakeFleet {
        count: StdMutex<u32>,
    }

    impl FleetController for FakeFleet {
        fn list_count(&self, _: &str, _: &str) -> FleetResult<u32> {
            Ok(*self.count.lock().unwrap())
        }

        fn set_count(&self, _: &str, _: &str, quantity: u32) -> FleetResult<()> {
            *self.count.lock().unwrap() = quantity;
            Ok(())
        }
    }

    struct FakeSource {
        enqueued: StdMutex<u64>,
    }

    impl MetricsSource for FakeSource {
        fn enqueued_count(&self, _: &QueueSet) -> MetricsResult<u64> {
            Ok(*self.enqueued.lock().unwrap())
        }

        fn scheduled_count(&self, _: &QueueSet) -> MetricsResult<u64> {
            Ok(0)
        }

        fn retrying_count(&self, _: &QueueSet) -> MetricsResult<u64> {
            Ok(0)
        }

        fn active_worker_count(&self, _: &QueueSet) -> MetricsResult<u64> {
            Ok(0)
        }

        fn list_instances(&self, _: &QueueSet) -> MetricsResult<Vec<WorkerInstance>> {
            Ok(Vec::new())
        }

        fn quiet(&self, _: &str) -> MetricsResult<()> {
            Ok(())
        }
    }

    fn process(fleet_count: u32, backlog: u64) -> (Arc<FakeFleet>, Arc<ScaleProcess>) {
        let fleet = Arc::new(FakeFleet {
            count: StdMutex::new(fleet_count),
        });
        let source = Arc::new(FakeSource {
            enqueued: StdMutex::new(backlog),
        });
        let metrics = QueueMetrics::new(QueueSet::All, true, true, source);
        let process = ScaleProcess::new(
            "exemplar",
            "worker",
            metrics,
            ScaleStrategy::Binary { max_instances: 1 },
            fleet.clone(),
            StateRepository::new(Arc::new(MemoryStore::new())),
        )
        .with_throttle(Duration::ZERO)
        .with_quiet_buffer(Duration::ZERO)
        .with_minimum_uptime(Duration::ZERO);
        (fleet, Arc::new(process))
    }

    async fn drain(poller: &Poller) {
        for _ in 0..50 {
            if poller.is_idle() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("poller did not drain");
    }

    #[tokio::test]
    async fn upscale_request_resolves_and_scales() {
        let (fleet, process) = process(0, 3);
        let poller = Poller::new(Probe::Upscale, Duration::ZERO, Duration::ZERO);

        poller.submit(process);
        drain(&poller).await;

        assert_eq!(*fleet.count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn shutdown_request_resolves_at_zero() {
        let (fleet, process) = process(1, 0);
        let poller = Poller::new(Probe::Shutdown, Duration::ZERO, Duration::ZERO);

        poller.submit(process);
        drain(&poller).await;

        assert_eq!(*fleet.count.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn resubmit_is_deduplicated() {
        let (_, process) = process(0, 0);
        let poller = Poller::new(Probe::Upscale, Duration::from_secs(60), Duration::ZERO);

        poller.submit(process.clone());
        poller.submit(process.clone());
        poller.submit(process);
        assert_eq!(poller.pending_count(), 1);

        poller.stop();
    }

    #[tokio::test]
    async fn worker_respawns_after_draining() {
        let (fleet, process) = process(0, 2);
        let poller = Poller::new(Probe::Upscale, Duration::ZERO, Duration::ZERO);

        poller.submit(process.clone());
        drain(&poller).await;
        assert_eq!(*fleet.count.lock().unwrap(), 1);

        // Backlog drains, the fleet idles back to zero out of band.
        *fleet.count.lock().unwrap() = 0;
        poller.submit(process);
        drain(&poller).await;
        assert_eq!(*fleet.count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn stop_clears_pending() {
        let (_, process) = process(0, 0);
        let poller = Poller::new(Probe::Upscale, Duration::from_secs(60), Duration::ZERO);

        poller.submit(process);
        poller.stop();
        assert!(poller.is_idle());
    }
}
