//! Prometheus metrics backend for dhc dispatch and run tracking.
//!
//! [`PrometheusMetrics`] implements [`dhc_core::metrics::MetricsBackend`]; hand a clone of it to
//! the polling service and the frameworks, and serve [`PrometheusMetrics::gather`] from your own
//! HTTP endpoint.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use dhc_core::{PollingService, metrics::MetricsHandle};
//! use dhc_prometheus::{Encoder, PrometheusMetrics, TextEncoder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//! let _polling = PollingService::with_metrics(handle);
//!
//! let mut buffer = Vec::new();
//! TextEncoder::new().encode(&metrics.gather(), &mut buffer)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `dhc_runs_submitted_total{framework, outcome}` - Counter
//! - `dhc_run_transitions_total{from, to}` - Counter
//! - `dhc_poll_errors_total{kind}` - Counter
//! - `dhc_active_pollers` - Gauge

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
