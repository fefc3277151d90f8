//! The per-process scale state machine.
//!
//! One [`ScaleProcess`] manages one process type: it measures backlog,
//! asks the strategy for a target, and walks the fleet toward it. Upscales
//! are immediate; downscales step one instance at a time through a
//! quietdown phase so in-flight jobs drain before capacity disappears.
//!
//! Every entry point is throttle-gated and synchronizes with the shared
//! store first, so any number of autoscaler instances can run the same
//! formation concurrently: whichever one holds the freshest record acts,
//! the rest observe.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ebbtide_metrics::{QueueMetrics, QueueSet, QueueSnapshot};
use ebbtide_state::{ScaleState, StateRepository};
use tracing::{debug, info};

use crate::error::{log_error_handler, ErrorHandler};
use crate::fleet::FleetController;
use crate::strategy::ScaleStrategy;

const DEFAULT_PERIOD: Duration = Duration::from_secs(10);

/// Scale state machine for one managed process type.
pub struct ScaleProcess {
    app_name: String,
    name: String,
    throttle: Duration,
    quiet_buffer: Duration,
    minimum_uptime: Duration,
    metrics: QueueMetrics,
    strategy: ScaleStrategy,
    fleet: Arc<dyn FleetController>,
    repo: StateRepository,
    on_error: ErrorHandler,
    state: Mutex<ScaleState>,
}

impl ScaleProcess {
    pub fn new(
        app_name: impl Into<String>,
        name: impl Into<String>,
        metrics: QueueMetrics,
        strategy: ScaleStrategy,
        fleet: Arc<dyn FleetController>,
        repo: StateRepository,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            name: name.into(),
            throttle: DEFAULT_PERIOD,
            quiet_buffer: DEFAULT_PERIOD,
            minimum_uptime: DEFAULT_PERIOD,
            metrics,
            strategy,
            fleet,
            repo,
            on_error: log_error_handler(),
            state: Mutex::new(ScaleState::default()),
        }
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_quiet_buffer(mut self, quiet_buffer: Duration) -> Self {
        self.quiet_buffer = quiet_buffer;
        self
    }

    pub fn with_minimum_uptime(mut self, minimum_uptime: Duration) -> Self {
        self.minimum_uptime = minimum_uptime;
        self
    }

    pub fn with_error_handler(mut self, on_error: ErrorHandler) -> Self {
        self.on_error = on_error;
        self
    }

    /// Store identity for this process: `"{app}:{process}"`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.app_name, self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// The queue set this process consumes from.
    pub fn queues(&self) -> &QueueSet {
        self.metrics.watch()
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    /// Copy of the current scale record.
    pub fn current_state(&self) -> ScaleState {
        self.state.lock().unwrap().clone()
    }

    /// Whether a downscale is pending.
    pub fn quieting(&self) -> bool {
        self.state.lock().unwrap().quieting()
    }

    /// Whether a pending quietdown has waited out the quiet buffer.
    pub fn fulfills_quietdown(&self) -> bool {
        let state = self.state.lock().unwrap();
        self.quiet_elapsed(&state, epoch_secs())
    }

    /// Whether the process has been up at least the minimum uptime.
    /// Vacuously true when the process is not running.
    pub fn fulfills_uptime(&self) -> bool {
        let state = self.state.lock().unwrap();
        self.uptime_elapsed(&state, epoch_secs())
    }

    /// Run one unconditional scale evaluation and return the resulting
    /// instance count. Bypasses the throttle and the store sync; the
    /// poller entry points below are the usual callers.
    pub fn update(&self) -> u32 {
        self.update_with(None, None)
    }

    /// [`ScaleProcess::update`] with the observed count and/or the target
    /// supplied by the caller instead of resolved from the providers.
    pub fn update_with(&self, observed: Option<u32>, target: Option<u32>) -> u32 {
        let mut state = self.state.lock().unwrap();
        self.run_update(&mut state, observed, target)
    }

    /// Poll on behalf of an upscale request made at `request_at`.
    ///
    /// Returns `true` when the request is resolved: an evaluation has run
    /// since the request, here or on a peer. Returns `false` while the
    /// throttle still holds the request open.
    pub fn wait_for_update(&self, request_at: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = epoch_secs();

        if updated_since(&state, request_at) {
            return true;
        }
        if self.throttled(&state, now) {
            return false;
        }

        // A peer may have acted while we waited out the throttle.
        self.sync_from_store(&mut state);
        if updated_since(&state, request_at) {
            return true;
        }
        if self.throttled(&state, now) {
            return false;
        }

        self.run_update(&mut state, None, None);
        true
    }

    /// Poll for shutdown: drive the count toward zero and report whether
    /// the process is fully scaled down.
    pub fn wait_for_shutdown(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = epoch_secs();

        if self.throttled(&state, now) {
            return false;
        }
        self.sync_from_store(&mut state);
        if self.throttled(&state, now) {
            return false;
        }

        let count = self.run_update(&mut state, None, None);
        count == 0 && self.uptime_elapsed(&state, epoch_secs())
    }

    // ── Evaluation ──

    fn run_update(&self, state: &mut ScaleState, observed: Option<u32>, target: Option<u32>) -> u32 {
        let now = epoch_secs();
        let count = observed.unwrap_or_else(|| self.fetch_count(state));

        state.count = count;
        state.touch(now);
        if count == 0 {
            state.clear_quietdown();
            state.started_at = None;
        } else if state.started_at.is_none() {
            state.started_at = Some(now);
        }
        self.persist(state);

        if !state.quieting() {
            let target = target.unwrap_or_else(|| self.resolve_target());

            if target == count {
                return count;
            }

            if target > count {
                info!(process = %self.id(), from = count, to = target, "scaling up");
                if self.push_count(target) {
                    state.count = target;
                    if state.started_at.is_none() {
                        state.started_at = Some(now);
                    }
                    self.persist(state);
                    return target;
                }
                return count;
            }

            // Downscales go one instance at a time, through a quietdown.
            let to = count.saturating_sub(1);
            let quieted_at = match self.metrics.quiet_down(to) {
                Ok(true) => now,
                // Nothing was actually told to quiet: back-date the
                // quietdown so the buffer is already spent.
                Ok(false) => now.saturating_sub(self.quiet_buffer.as_secs() + 1),
                Err(err) => {
                    (self.on_error)(&anyhow::Error::new(err));
                    now.saturating_sub(self.quiet_buffer.as_secs() + 1)
                }
            };
            debug!(process = %self.id(), to, quieted_at, "quietdown initiated");
            state.begin_quietdown(to, quieted_at);
            self.persist(state);
        }

        // A quietdown is pending, possibly initiated just above.
        if self.quiet_elapsed(state, now) && self.uptime_elapsed(state, now) {
            let to = state.quieted_to.unwrap_or(0);
            info!(process = %self.id(), from = state.count, to, "scaling down");
            if self.push_count(to) {
                state.count = to;
                state.clear_quietdown();
                if to == 0 {
                    state.started_at = None;
                }
                self.persist(state);
                return to;
            }
        }

        state.count
    }

    /// Backlog snapshot mapped through the strategy. A metrics failure
    /// reads as an empty system, degrading toward scale-to-zero rather
    /// than holding capacity on stale data.
    fn resolve_target(&self) -> u32 {
        let snapshot = match self.metrics.snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                (self.on_error)(&anyhow::Error::new(err));
                QueueSnapshot::default()
            }
        };
        self.strategy.target(&snapshot)
    }

    /// Observed instance count, falling back to the last-known count when
    /// the provider is unreachable.
    fn fetch_count(&self, state: &ScaleState) -> u32 {
        match self.fleet.list_count(&self.app_name, &self.name) {
            Ok(count) => count,
            Err(err) => {
                (self.on_error)(&anyhow::Error::new(err));
                state.count
            }
        }
    }

    /// Push a new count to the provider. A failure leaves local state
    /// untouched so the next evaluation retries from scratch.
    fn push_count(&self, quantity: u32) -> bool {
        match self.fleet.set_count(&self.app_name, &self.name, quantity) {
            Ok(()) => true,
            Err(err) => {
                (self.on_error)(&anyhow::Error::new(err));
                false
            }
        }
    }

    fn sync_from_store(&self, state: &mut ScaleState) {
        match self.repo.load(&self.id()) {
            Ok(remote) => {
                if state.adopt_newer(&remote) {
                    debug!(process = %self.id(), count = state.count, "adopted peer state");
                }
            }
            Err(err) => (self.on_error)(&anyhow::Error::new(err)),
        }
    }

    fn persist(&self, state: &ScaleState) {
        if let Err(err) = self.repo.save(&self.id(), state) {
            (self.on_error)(&anyhow::Error::new(err));
        }
    }

    fn throttled(&self, state: &ScaleState, now: u64) -> bool {
        state
            .updated_at
            .is_some_and(|at| now.saturating_sub(at) < self.throttle.as_secs())
    }

    fn quiet_elapsed(&self, state: &ScaleState, now: u64) -> bool {
        state
            .quieted_at
            .is_some_and(|at| now.saturating_sub(at) >= self.quiet_buffer.as_secs())
    }

    fn uptime_elapsed(&self, state: &ScaleState, now: u64) -> bool {
        state
            .started_at
            .is_none_or(|at| now.saturating_sub(at) >= self.minimum_uptime.as_secs())
    }
}

fn updated_since(state: &ScaleState, request_at: u64) -> bool {
    state.updated_at.is_some_and(|at| at > request_at)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
