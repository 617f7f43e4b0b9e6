//! Metrics collection and exposition for Prometheus.
//!
//! Tracks resolver operations, individual provider calls and fallbacks.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
