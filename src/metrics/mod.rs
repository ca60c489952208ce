//! Metrics and observability
//!
//! Session counters, an optional Prometheus exporter and a JSON status API.

mod api;
mod counters;
mod exporter;

pub use api::start_api_server;
pub use counters::*;
pub use exporter::init_metrics;
