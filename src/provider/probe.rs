//! TCP probe provider
//!
//! Treats a successful TCP connect to `address:port` as the tunnel coming
//! up and holds that stream until disconnect.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::{TunnelEventSink, TunnelProvider};
use crate::session::{Address, AttemptId, TunnelOutcome};

/// Latest attempt issued and the stream held for it.
///
/// Both live under one lock so a probe finishing for an older attempt can
/// never store its stream after a disconnect has emptied the slot.
#[derive(Default)]
struct ProbeSlot {
    latest: u64,
    stream: Option<TcpStream>,
}

impl ProbeSlot {
    /// Start `attempt`, returning the stream of the one it supersedes
    fn begin(&mut self, attempt: AttemptId) -> Option<TcpStream> {
        self.latest = attempt.as_u64();
        self.stream.take()
    }

    /// Keep `stream` if `attempt` is still the latest; otherwise it is dropped
    fn hold(&mut self, attempt: AttemptId, stream: TcpStream) -> bool {
        if self.latest != attempt.as_u64() {
            return false;
        }
        self.stream = Some(stream);
        true
    }
}

pub struct ProbeProvider {
    port: u16,
    timeout: Duration,
    slot: Arc<Mutex<ProbeSlot>>,
}

impl ProbeProvider {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self {
            port,
            timeout,
            slot: Arc::new(Mutex::new(ProbeSlot::default())),
        }
    }

    /// Whether a probe stream is currently held open
    pub fn is_holding(&self) -> bool {
        self.slot.lock().stream.is_some()
    }
}

impl TunnelProvider for ProbeProvider {
    fn connect(&self, address: &Address, attempt: AttemptId, events: TunnelEventSink) {
        if let Some(stream) = self.slot.lock().begin(attempt) {
            debug!(%attempt, peer = ?stream.peer_addr().ok(), "Dropping superseded probe stream");
        }

        let host = address.as_str().to_owned();
        let port = self.port;
        let timeout = self.timeout;
        let slot = self.slot.clone();

        tokio::spawn(async move {
            debug!(%host, port, %attempt, "Probing endpoint");
            let outcome = match tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port))).await {
                Ok(Ok(stream)) => {
                    if slot.lock().hold(attempt, stream) {
                        info!(%host, port, %attempt, "Endpoint reachable");
                    } else {
                        debug!(%host, port, %attempt, "Probe superseded, closing stream");
                    }
                    TunnelOutcome::Success
                }
                Ok(Err(e)) => TunnelOutcome::failure(format!("{host}:{port}: {e}")),
                Err(_) => TunnelOutcome::failure(format!(
                    "{host}:{port}: no response within {}ms",
                    timeout.as_millis()
                )),
            };
            events.report(attempt, outcome);
        });
    }

    fn disconnect(&self, attempt: AttemptId, events: TunnelEventSink) {
        if let Some(stream) = self.slot.lock().begin(attempt) {
            debug!(%attempt, peer = ?stream.peer_addr().ok(), "Closing probe stream");
        }
        events.report(attempt, TunnelOutcome::Success);
    }
}
