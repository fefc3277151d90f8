//! Backlog-driven worker autoscaling.
//!
//! `ebbtide-autoscale` turns queue backlog into instance counts: a
//! [`ScaleStrategy`] maps measurements from `ebbtide-metrics` to a target,
//! a [`ScaleProcess`] walks the fleet toward that target through
//! throttle, quietdown, and minimum-uptime gates, and a [`Formation`]
//! routes queues to processes. The [`Autoscaler`] facade ties it together
//! behind two calls: [`Autoscaler::request_upscale`] when work is
//! enqueued and [`Autoscaler::monitor_shutdown`] when a worker boots.
//!
//! Scale state lives in a shared store from `ebbtide-state`, so multiple
//! application processes can run the same formation concurrently.

pub mod app;
pub mod config;
pub mod error;
pub mod fleet;
pub mod formation;
pub mod poller;
pub mod process;
pub mod strategy;

pub use app::Autoscaler;
pub use config::{AutoscaleConfig, ProcessConfig};
pub use error::{log_error_handler, ConfigError, ErrorHandler};
pub use fleet::{FleetController, FleetError, FleetResult};
pub use formation::Formation;
pub use poller::{Poller, Probe};
pub use process::ScaleProcess;
pub use strategy::ScaleStrategy;
