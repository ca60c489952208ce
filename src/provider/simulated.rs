//! Simulated provider
//!
//! Stands in for the platform tunnel. In manual mode it only records calls
//! and the caller drives outcomes; otherwise each call completes after a
//! fixed latency.

use parking_lot::Mutex;
use std::time::Duration;
use tracing::debug;

use super::{TunnelEventSink, TunnelProvider};
use crate::session::{Address, AttemptId, TunnelOutcome};

/// A call the session manager made on the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Connect { address: Address, attempt: AttemptId },
    Disconnect { attempt: AttemptId },
}

impl ProviderCall {
    pub fn attempt(&self) -> AttemptId {
        match self {
            Self::Connect { attempt, .. } | Self::Disconnect { attempt } => *attempt,
        }
    }
}

pub struct SimulatedProvider {
    /// `None` = manual mode
    latency: Option<Duration>,
    /// Hosts whose connect attempts fail
    fail_hosts: Vec<String>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl SimulatedProvider {
    /// Record calls without ever reporting an outcome
    pub fn manual() -> Self {
        Self {
            latency: None,
            fail_hosts: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Report every outcome after `latency`
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::manual()
        }
    }

    /// Make connects to these hosts fail
    pub fn fail_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fail_hosts
            .extend(hosts.into_iter().map(|h| h.into().to_ascii_lowercase()));
        self
    }

    /// All calls made so far, oldest first
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// Attempt id of the most recent call
    pub fn last_attempt(&self) -> Option<AttemptId> {
        self.calls.lock().last().map(ProviderCall::attempt)
    }

    fn complete_later(&self, attempt: AttemptId, outcome: TunnelOutcome, events: TunnelEventSink) {
        let Some(latency) = self.latency else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            events.report(attempt, outcome);
        });
    }
}

impl TunnelProvider for SimulatedProvider {
    fn connect(&self, address: &Address, attempt: AttemptId, events: TunnelEventSink) {
        debug!(%address, %attempt, "Simulated connect");
        self.calls.lock().push(ProviderCall::Connect {
            address: address.clone(),
            attempt,
        });

        let outcome = if self.fail_hosts.iter().any(|h| h == address.as_str()) {
            TunnelOutcome::failure(format!("{address} is unreachable"))
        } else {
            TunnelOutcome::Success
        };
        self.complete_later(attempt, outcome, events);
    }

    fn disconnect(&self, attempt: AttemptId, events: TunnelEventSink) {
        debug!(%attempt, "Simulated disconnect");
        self.calls.lock().push(ProviderCall::Disconnect { attempt });
        self.complete_later(attempt, TunnelOutcome::Success, events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Command;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_reports_after_latency() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let provider = SimulatedProvider::with_latency(Duration::from_millis(250))
            .fail_hosts(["Bad.Example.com"]);

        let good = Address::parse("10.0.0.1").unwrap();
        let bad = Address::parse("bad.example.com").unwrap();
        provider.connect(&good, AttemptId(1), TunnelEventSink::new(&tx));
        provider.connect(&bad, AttemptId(2), TunnelEventSink::new(&tx));

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            match rx.recv().await {
                Some(Command::TunnelEvent { attempt, outcome }) => outcomes.push((attempt, outcome)),
                _ => panic!("expected a tunnel event"),
            }
        }
        outcomes.sort_by_key(|(attempt, _)| *attempt);

        assert_eq!(outcomes[0], (AttemptId(1), TunnelOutcome::Success));
        assert!(matches!(outcomes[1].1, TunnelOutcome::Failure(_)));
        assert_eq!(provider.last_attempt(), Some(AttemptId(2)));
    }

    #[tokio::test]
    async fn test_manual_mode_only_records() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let provider = SimulatedProvider::manual();

        provider.disconnect(AttemptId(7), TunnelEventSink::new(&tx));

        assert_eq!(provider.calls(), vec![ProviderCall::Disconnect { attempt: AttemptId(7) }]);
        assert!(rx.try_recv().is_err());
    }
}
