//! Session state machine
//!
//! `SessionCore` owns every piece of session state and is only ever touched
//! from the session task, so none of it is locked. It never sleeps: the
//! grace-clear deadline is exposed through [`SessionCore::grace_clear`] and
//! the task driving the core decides when to fire it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::address::Address;
use super::error::{SessionError, StateError};
use super::state::{AttemptId, ConnectionState, SessionSnapshot, TunnelOutcome};
use super::subscribers::{StateObserver, StateSubscriber, SubscriberRegistry, SubscriptionHandle};
use crate::metrics::METRICS;
use crate::provider::{TunnelEventSink, TunnelProvider};

/// A scheduled clear of the displayed address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraceClear {
    pub generation: u64,
    pub deadline: Instant,
}

pub struct SessionCore {
    provider: Arc<dyn TunnelProvider>,
    events: TunnelEventSink,
    state: ConnectionState,
    address: Option<Address>,
    attempt: AttemptId,
    grace_delay: Duration,
    grace_clear: Option<GraceClear>,
    clear_generation: u64,
    subscribers: SubscriberRegistry,
    published: watch::Sender<SessionSnapshot>,
}

impl SessionCore {
    pub fn new(grace_delay: Duration, provider: Arc<dyn TunnelProvider>, events: TunnelEventSink) -> Self {
        let (published, _) = watch::channel(SessionSnapshot::default());
        Self {
            provider,
            events,
            state: ConnectionState::Disconnected,
            address: None,
            attempt: AttemptId::default(),
            grace_delay,
            grace_clear: None,
            clear_generation: 0,
            subscribers: SubscriberRegistry::new(),
            published,
        }
    }

    /// Receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.published.subscribe()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state.clone(),
            address: self.address.clone(),
            attempt: self.attempt,
        }
    }

    /// Pending grace-clear, if any
    pub fn grace_clear(&self) -> Option<GraceClear> {
        self.grace_clear
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn StateSubscriber>) -> SubscriptionHandle {
        self.subscribers.subscribe(subscriber)
    }

    pub fn observe(&mut self, observer: &Arc<dyn StateObserver>) -> SubscriptionHandle {
        self.subscribers.observe(observer)
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        self.subscribers.unsubscribe(handle)
    }

    /// Validate `input` and start a connect attempt
    pub fn request_connect(&mut self, input: &str) -> Result<(), SessionError> {
        METRICS.connect_requested();

        let address = Address::parse(input).map_err(|e| {
            METRICS.validation_rejected();
            debug!(input, error = %e, "Rejected connect request");
            e
        })?;

        if !self.state.accepts_connect() {
            METRICS.busy_rejected();
            debug!(state = self.state.name(), %address, "Connect refused, session busy");
            return Err(StateError::Busy.into());
        }

        self.cancel_grace_clear();
        self.attempt = self.attempt.next();
        self.address = Some(address.clone());
        info!(attempt = %self.attempt, %address, "Connecting");
        self.transition(ConnectionState::Connecting);

        self.provider.connect(&address, self.attempt, self.events.clone());
        Ok(())
    }

    /// Start tearing down the current tunnel or connect attempt
    pub fn request_disconnect(&mut self) -> Result<(), SessionError> {
        match self.state {
            ConnectionState::Disconnected => {
                debug!("Disconnect requested while already disconnected");
                Ok(())
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.attempt = self.attempt.next();
                info!(
                    attempt = %self.attempt,
                    from = self.state.name(),
                    address = ?self.address.as_ref().map(Address::as_str),
                    "Disconnecting"
                );
                self.transition(ConnectionState::Disconnecting);

                self.provider.disconnect(self.attempt, self.events.clone());
                Ok(())
            }
            ConnectionState::Disconnecting => {
                METRICS.busy_rejected();
                Err(StateError::Busy.into())
            }
            ConnectionState::Failed(_) => Err(StateError::InvalidTransition.into()),
        }
    }

    /// The single-button action: disconnect if up or coming up, otherwise connect
    pub fn toggle(&mut self, input: &str) -> Result<(), SessionError> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => self.request_disconnect(),
            _ => self.request_connect(input),
        }
    }

    /// Apply a provider outcome
    pub fn on_tunnel_event(&mut self, attempt: AttemptId, outcome: TunnelOutcome) {
        if attempt != self.attempt {
            METRICS.stale_event();
            debug!(%attempt, current = %self.attempt, "Discarding stale tunnel event");
            return;
        }

        let next = match (&self.state, outcome) {
            (ConnectionState::Connecting, TunnelOutcome::Success) => {
                METRICS.connect_established();
                info!(%attempt, address = ?self.address.as_ref().map(Address::as_str), "Connected");
                ConnectionState::Connected
            }
            (ConnectionState::Disconnecting, TunnelOutcome::Success) => {
                METRICS.disconnect_completed();
                info!(%attempt, "Disconnected");
                ConnectionState::Disconnected
            }
            (
                ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Disconnecting,
                TunnelOutcome::Failure(failure),
            ) => {
                METRICS.tunnel_failed();
                warn!(
                    %attempt,
                    from = self.state.name(),
                    reason = %failure.reason,
                    "Tunnel attempt failed"
                );
                ConnectionState::Failed(failure)
            }
            (state, outcome) => {
                debug!(%attempt, state = state.name(), ?outcome, "Tunnel event has no effect");
                return;
            }
        };

        let disconnected = next == ConnectionState::Disconnected;
        self.transition(next);
        if disconnected {
            self.arm_grace_clear();
        }
    }

    /// Grace deadline reached for `generation`
    pub fn on_grace_elapsed(&mut self, generation: u64) {
        match self.grace_clear {
            Some(pending) if pending.generation == generation => {
                self.grace_clear = None;
                if self.state == ConnectionState::Disconnected && self.address.is_some() {
                    METRICS.grace_cleared();
                    debug!(generation, "Clearing address after grace delay");
                    self.address = None;
                    self.publish();
                }
            }
            _ => debug!(generation, "Ignoring superseded grace-clear"),
        }
    }

    /// Tear down before the session task exits.
    ///
    /// Always ends in `Disconnected` with no address; no provider outcome
    /// can be applied after this.
    pub fn shutdown(&mut self) {
        self.cancel_grace_clear();
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            self.attempt = self.attempt.next();
            info!(attempt = %self.attempt, from = self.state.name(), "Releasing tunnel on shutdown");
            self.provider.disconnect(self.attempt, self.events.clone());
        }

        if self.state != ConnectionState::Disconnected || self.address.is_some() {
            self.address = None;
            self.transition(ConnectionState::Disconnected);
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = self.state.name(), to = next.name(), "State transition");
        self.state = next;
        self.publish();
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.published.send_replace(snapshot.clone());
        self.subscribers.notify(&snapshot);
    }

    fn arm_grace_clear(&mut self) {
        self.clear_generation += 1;
        self.grace_clear = Some(GraceClear {
            generation: self.clear_generation,
            deadline: Instant::now() + self.grace_delay,
        });
        debug!(
            generation = self.clear_generation,
            delay_ms = self.grace_delay.as_millis() as u64,
            "Grace-clear armed"
        );
    }

    fn cancel_grace_clear(&mut self) {
        if let Some(pending) = self.grace_clear.take() {
            METRICS.grace_clear_cancelled();
            debug!(generation = pending.generation, "Grace-clear cancelled");
        }
    }
}
