//! Telemetry module for logging and metrics.
//!
//! Provides:
//! - Logging configuration and initialization
//! - Once-per-node diagnostics
//! - Metrics collection for frame statistics

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, WarnOnce};
pub use metrics::{Counter, InterfaceStats, MetricsRegistry};
