//! Session manager
//!
//! Runs a [`SessionCore`] on its own task and hands out cheap, cloneable
//! handles. Requests and provider events share one FIFO queue, so they are
//! applied in the order they were submitted.

use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::error::SessionError;
use super::machine::SessionCore;
use super::state::{AttemptId, ConnectionState, SessionSnapshot, TunnelOutcome};
use super::subscribers::{StateObserver, StateSubscriber, SubscriptionHandle};
use crate::config::SessionConfig;
use crate::provider::{TunnelEventSink, TunnelProvider};

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Delay before the address is cleared after a disconnect
    pub grace_delay: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            grace_delay: Duration::from_millis(2000),
        }
    }
}

impl From<&SessionConfig> for SessionManagerConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            grace_delay: config.grace_delay(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Work items for the session task
pub(crate) enum Command {
    Connect { address: String, reply: Reply<()> },
    Disconnect { reply: Reply<()> },
    Toggle { address: String, reply: Reply<()> },
    TunnelEvent { attempt: AttemptId, outcome: TunnelOutcome },
    Subscribe { subscriber: Box<dyn StateSubscriber>, reply: oneshot::Sender<SubscriptionHandle> },
    Observe { observer: Arc<dyn StateObserver>, reply: oneshot::Sender<SubscriptionHandle> },
    Unsubscribe { handle: SubscriptionHandle, reply: oneshot::Sender<bool> },
    Flush { reply: oneshot::Sender<()> },
    Shutdown,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionManager {
    /// Start the session task.
    ///
    /// The task stops on [`SessionManager::shutdown`] or once every handle
    /// has been dropped.
    pub fn spawn(config: SessionManagerConfig, provider: Arc<dyn TunnelProvider>) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let core = SessionCore::new(config.grace_delay, provider, TunnelEventSink::new(&commands));
        let snapshot = core.watch();

        let task = tokio::spawn(run(core, rx));
        info!(grace_delay_ms = config.grace_delay.as_millis() as u64, "Session manager started");

        (Self { commands, snapshot }, task)
    }

    /// Validate `address` and start connecting.
    ///
    /// Returns once the request has been applied; the outcome of the
    /// connect itself arrives later as a state change.
    pub async fn request_connect(&self, address: impl Into<String>) -> Result<(), SessionError> {
        let address = address.into();
        self.request(|reply| Command::Connect { address, reply }).await
    }

    /// Start disconnecting; a no-op when already disconnected
    pub async fn request_disconnect(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Connect if down, disconnect if up or coming up
    pub async fn toggle(&self, address: impl Into<String>) -> Result<(), SessionError> {
        let address = address.into();
        self.request(|reply| Command::Toggle { address, reply }).await
    }

    /// Deliver a provider outcome; applied on the session task
    pub fn on_tunnel_event(&self, attempt: AttemptId, outcome: TunnelOutcome) {
        if self.commands.send(Command::TunnelEvent { attempt, outcome }).is_err() {
            debug!(%attempt, "Session closed, dropping tunnel event");
        }
    }

    /// Sink a provider can report through from any thread
    pub fn event_sink(&self) -> TunnelEventSink {
        TunnelEventSink::new(&self.commands)
    }

    /// Register a callback run on every change, on the session task
    pub async fn subscribe<F>(&self, callback: F) -> Result<SubscriptionHandle, SessionError>
    where
        F: FnMut(&SessionSnapshot) -> anyhow::Result<()> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Subscribe {
            subscriber: Box::new(callback),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Register a shared observer; the session keeps only a weak reference
    pub async fn observe(&self, observer: &Arc<dyn StateObserver>) -> Result<SubscriptionHandle, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Observe {
            observer: observer.clone(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop notifications for `handle`; false if it was not registered
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unsubscribe { handle, reply })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Current connection state
    pub fn current_state(&self) -> ConnectionState {
        self.snapshot.borrow().state.clone()
    }

    /// Current state, address and attempt
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver for change-driven consumers
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until everything queued before this call has been applied
    pub async fn flush(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Flush { reply })?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the session task; an up or pending tunnel is torn down first
    pub fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).is_err() {
            debug!("Session already closed");
        }
    }

    async fn request(&self, command: impl FnOnce(Reply<()>) -> Command) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply))?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

/// Session task: applies commands in order and fires the grace-clear
async fn run(mut core: SessionCore, mut commands: mpsc::UnboundedReceiver<Command>) {
    loop {
        let pending = core.grace_clear();
        let grace_elapsed = async move {
            match pending {
                Some(clear) => {
                    tokio::time::sleep_until(clear.deadline).await;
                    clear.generation
                }
                None => future::pending::<u64>().await,
            }
        };

        // Deadline before queue: the clear must fire even under steady traffic
        tokio::select! {
            biased;

            generation = grace_elapsed => core.on_grace_elapsed(generation),
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => apply(&mut core, command),
            },
        }
    }

    core.shutdown();
    info!(state = core.state().name(), "Session manager stopped");
}

fn apply(core: &mut SessionCore, command: Command) {
    match command {
        Command::Connect { address, reply } => {
            let _ = reply.send(core.request_connect(&address));
        }
        Command::Disconnect { reply } => {
            let _ = reply.send(core.request_disconnect());
        }
        Command::Toggle { address, reply } => {
            let _ = reply.send(core.toggle(&address));
        }
        Command::TunnelEvent { attempt, outcome } => core.on_tunnel_event(attempt, outcome),
        Command::Subscribe { subscriber, reply } => {
            let _ = reply.send(core.subscribe(subscriber));
        }
        Command::Observe { observer, reply } => {
            let _ = reply.send(core.observe(&observer));
        }
        Command::Unsubscribe { handle, reply } => {
            let _ = reply.send(core.unsubscribe(handle));
        }
        Command::Flush { reply } => {
            let _ = reply.send(());
        }
        Command::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SimulatedProvider;

    #[tokio::test]
    async fn test_manager_lifecycle() {
        let provider = Arc::new(SimulatedProvider::manual());
        let (manager, task) = SessionManager::spawn(SessionManagerConfig::default(), provider.clone());

        manager.request_connect("192.168.1.1").await.unwrap();
        assert_eq!(manager.current_state(), ConnectionState::Connecting);

        let attempt = provider.last_attempt().unwrap();
        manager.on_tunnel_event(attempt, TunnelOutcome::Success);
        manager.flush().await.unwrap();
        assert_eq!(manager.current_state(), ConnectionState::Connected);

        manager.shutdown();
        task.await.unwrap();

        // Shutdown releases the tunnel on the provider side
        assert_eq!(provider.calls().len(), 2);
        assert_eq!(manager.request_disconnect().await, Err(SessionError::Closed));
    }

    #[tokio::test]
    async fn test_shutdown_publishes_final_disconnected_state() {
        let provider = Arc::new(SimulatedProvider::manual());
        let (manager, task) = SessionManager::spawn(SessionManagerConfig::default(), provider.clone());

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        manager
            .subscribe(move |snapshot| {
                sink.lock().push(snapshot.state.clone());
                Ok(())
            })
            .await
            .unwrap();

        manager.request_connect("192.168.1.1").await.unwrap();
        manager.on_tunnel_event(AttemptId(1), TunnelOutcome::Success);
        manager.shutdown();
        task.await.unwrap();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert!(snapshot.address.is_none());
        assert_eq!(manager.watch().borrow().state, ConnectionState::Disconnected);
        assert_eq!(
            *seen.lock(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
            ]
        );

        // Shutting down twice is harmless
        manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_clear_fires_while_commands_keep_arriving() {
        let (manager, _task) = SessionManager::spawn(
            SessionManagerConfig::default(),
            Arc::new(SimulatedProvider::manual()),
        );
        manager.request_connect("10.0.0.1").await.unwrap();
        manager.on_tunnel_event(AttemptId(1), TunnelOutcome::Success);
        manager.request_disconnect().await.unwrap();
        manager.on_tunnel_event(AttemptId(2), TunnelOutcome::Success);
        manager.flush().await.unwrap();

        tokio::time::advance(Duration::from_millis(2001)).await;
        // Stale events queued past the deadline must not starve the clear
        for _ in 0..100 {
            manager.on_tunnel_event(AttemptId(1), TunnelOutcome::Success);
        }
        manager.flush().await.unwrap();

        assert!(manager.snapshot().address.is_none());
        assert_eq!(manager.current_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_task_stops_when_handles_dropped() {
        let (manager, task) = SessionManager::spawn(
            SessionManagerConfig::default(),
            Arc::new(SimulatedProvider::manual()),
        );
        drop(manager);
        task.await.unwrap();
    }
}
