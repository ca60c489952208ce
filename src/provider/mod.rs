//! Tunnel providers
//!
//! A provider performs the actual connect/disconnect work for the session
//! manager. Calls are fire-and-forget; outcomes come back through the
//! [`TunnelEventSink`] handed to each call.

mod probe;
mod simulated;

pub use probe::ProbeProvider;
pub use simulated::{ProviderCall, SimulatedProvider};

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::{ProviderConfig, ProviderKind};
use crate::session::{Address, AttemptId, Command, TunnelOutcome};

/// Platform capability that brings a tunnel up or down.
///
/// Implementations must not block: start the work (typically on a spawned
/// task) and report the outcome through `events`.
pub trait TunnelProvider: Send + Sync + 'static {
    fn connect(&self, address: &Address, attempt: AttemptId, events: TunnelEventSink);
    fn disconnect(&self, attempt: AttemptId, events: TunnelEventSink);
}

/// Delivers provider outcomes to the session task.
///
/// Holds only a weak reference to the session's queue, so a provider task
/// that outlives its session never keeps it alive.
#[derive(Clone)]
pub struct TunnelEventSink {
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl TunnelEventSink {
    pub(crate) fn new(commands: &mpsc::UnboundedSender<Command>) -> Self {
        Self {
            commands: commands.downgrade(),
        }
    }

    /// Report the outcome of an attempt; safe to call from any thread
    pub fn report(&self, attempt: AttemptId, outcome: TunnelOutcome) {
        let delivered = self
            .commands
            .upgrade()
            .map(|tx| tx.send(Command::TunnelEvent { attempt, outcome }).is_ok())
            .unwrap_or(false);

        if !delivered {
            debug!(%attempt, "Session closed, dropping tunnel event");
        }
    }
}

impl std::fmt::Debug for TunnelEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelEventSink").finish_non_exhaustive()
    }
}

/// Build the provider selected in configuration
pub fn from_config(config: &ProviderConfig) -> Arc<dyn TunnelProvider> {
    match config.kind {
        ProviderKind::Simulated => Arc::new(
            SimulatedProvider::with_latency(config.latency())
                .fail_hosts(config.fail_hosts.iter().cloned()),
        ),
        ProviderKind::Probe => Arc::new(ProbeProvider::new(config.probe_port, config.probe_timeout())),
    }
}
