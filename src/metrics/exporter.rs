//! Prometheus metrics exporter
//!
//! HTTP endpoint for Prometheus scraping.

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;

use super::counters::METRICS;
use crate::config::MetricsConfig;
use crate::session::{ConnectionState, SessionSnapshot};

const PREFIX: &str = "tunnel_session";

/// Initialize the Prometheus metrics exporter
pub fn init_metrics(config: &MetricsConfig, session: watch::Receiver<SessionSnapshot>) -> Result<()> {
    describe_counter!(format!("{PREFIX}_connect_requests"), "Connect requests received");
    describe_counter!(format!("{PREFIX}_validation_rejections"), "Connect requests with an invalid address");
    describe_counter!(format!("{PREFIX}_busy_rejections"), "Requests refused while busy");
    describe_counter!(format!("{PREFIX}_connects_established"), "Tunnels brought up");
    describe_counter!(format!("{PREFIX}_tunnel_failures"), "Failures reported by the provider");
    describe_counter!(format!("{PREFIX}_disconnects_completed"), "Tunnels torn down");
    describe_counter!(format!("{PREFIX}_stale_events"), "Provider events for superseded attempts");
    describe_counter!(format!("{PREFIX}_subscriber_failures"), "Subscriber errors and panics");
    describe_counter!(format!("{PREFIX}_grace_clears"), "Addresses cleared after the grace delay");
    describe_counter!(format!("{PREFIX}_grace_clears_cancelled"), "Grace-clears cancelled by a new connect");
    describe_gauge!(format!("{PREFIX}_connected"), "1 while the tunnel is up");

    // Build and install the Prometheus exporter
    PrometheusBuilder::new()
        .with_http_listener(config.bind_addr)
        .install()?;

    // Start background task to sync atomic counters to metrics crate
    tokio::spawn(sync_metrics_task(session));

    Ok(())
}

/// Background task that periodically syncs our atomic counters to the metrics crate
async fn sync_metrics_task(session: watch::Receiver<SessionSnapshot>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));

    let mut last_snapshot = METRICS.snapshot();
    for (name, value) in last_snapshot.counters() {
        counter!(format!("{PREFIX}_{name}")).absolute(value);
    }

    loop {
        interval.tick().await;

        let snapshot = METRICS.snapshot();

        // Update counters with deltas
        for ((name, value), (_, last)) in snapshot.counters().into_iter().zip(last_snapshot.counters()) {
            let delta = value.saturating_sub(last);
            if delta > 0 {
                counter!(format!("{PREFIX}_{name}")).increment(delta);
            }
        }

        let connected = matches!(session.borrow().state, ConnectionState::Connected);
        gauge!(format!("{PREFIX}_connected")).set(if connected { 1.0 } else { 0.0 });

        last_snapshot = snapshot;
    }
}
