//! Grace-clear timing tests
//!
//! Time is paused, so sleeps advance the clock deterministically.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_test::assert_ok;

use tunnel_session::provider::SimulatedProvider;
use tunnel_session::session::{Address, AttemptId, ConnectionState, SessionSnapshot, TunnelOutcome};
use tunnel_session::{SessionManager, SessionManagerConfig};

fn displayed(manager: &SessionManager) -> Option<String> {
    manager.snapshot().address.as_ref().map(Address::to_string)
}

/// Connect then disconnect `address` with a manual provider, ending Disconnected
async fn connect_and_disconnect(manager: &SessionManager, address: &str) {
    assert_ok!(manager.request_connect(address).await);
    let attempt = manager.snapshot().attempt;
    manager.on_tunnel_event(attempt, TunnelOutcome::Success);
    assert_ok!(manager.request_disconnect().await);
    manager.on_tunnel_event(attempt.next(), TunnelOutcome::Success);
    assert_ok!(manager.flush().await);
    assert_eq!(manager.current_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_address_cleared_after_grace_delay() {
    let (manager, _task) = SessionManager::spawn(
        SessionManagerConfig::default(),
        Arc::new(SimulatedProvider::manual()),
    );
    connect_and_disconnect(&manager, "192.168.1.1").await;

    sleep(Duration::from_millis(1999)).await;
    assert_ok!(manager.flush().await);
    assert_eq!(displayed(&manager).as_deref(), Some("192.168.1.1"));

    sleep(Duration::from_millis(2)).await;
    assert_ok!(manager.flush().await);
    assert_eq!(displayed(&manager), None);
    assert_eq!(manager.current_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_new_connect_cancels_pending_clear() {
    let (manager, _task) = SessionManager::spawn(
        SessionManagerConfig::default(),
        Arc::new(SimulatedProvider::manual()),
    );
    connect_and_disconnect(&manager, "10.0.0.1").await;

    sleep(Duration::from_secs(1)).await;
    assert_ok!(manager.request_connect("10.0.0.2").await);

    sleep(Duration::from_millis(1500)).await;
    assert_ok!(manager.flush().await);
    assert_eq!(displayed(&manager).as_deref(), Some("10.0.0.2"));
    assert_eq!(manager.current_state(), ConnectionState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_connect_keeps_pending_clear() {
    let (manager, _task) = SessionManager::spawn(
        SessionManagerConfig::default(),
        Arc::new(SimulatedProvider::manual()),
    );
    connect_and_disconnect(&manager, "10.0.0.1").await;

    sleep(Duration::from_secs(1)).await;
    assert!(manager.request_connect("not_an_ip").await.is_err());

    sleep(Duration::from_millis(1500)).await;
    assert_ok!(manager.flush().await);
    assert_eq!(displayed(&manager), None);
}

#[tokio::test(start_paused = true)]
async fn test_custom_grace_delay() {
    let config = SessionManagerConfig {
        grace_delay: Duration::from_millis(500),
    };
    let (manager, _task) = SessionManager::spawn(config, Arc::new(SimulatedProvider::manual()));
    connect_and_disconnect(&manager, "10.0.0.1").await;

    sleep(Duration::from_millis(501)).await;
    assert_ok!(manager.flush().await);
    assert_eq!(displayed(&manager), None);
}

#[tokio::test(start_paused = true)]
async fn test_full_cycle_with_simulated_latency() {
    let provider = Arc::new(SimulatedProvider::with_latency(Duration::from_millis(300)));
    let (manager, _task) = SessionManager::spawn(SessionManagerConfig::default(), provider.clone());

    let seen: Arc<Mutex<Vec<SessionSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    assert_ok!(
        manager
            .subscribe(move |snapshot| {
                sink.lock().push(snapshot.clone());
                Ok(())
            })
            .await
    );

    assert_ok!(manager.request_connect("192.168.1.1").await);
    sleep(Duration::from_millis(400)).await;
    assert_ok!(manager.flush().await);
    assert_eq!(manager.current_state(), ConnectionState::Connected);

    assert_ok!(manager.request_disconnect().await);
    sleep(Duration::from_millis(400)).await;
    assert_ok!(manager.flush().await);
    assert_eq!(manager.current_state(), ConnectionState::Disconnected);

    sleep(Duration::from_secs(2)).await;
    assert_ok!(manager.flush().await);

    let states: Vec<(ConnectionState, Option<String>)> = seen
        .lock()
        .iter()
        .map(|s| (s.state.clone(), s.address.as_ref().map(Address::to_string)))
        .collect();
    let addr = Some("192.168.1.1".to_string());
    assert_eq!(
        states,
        vec![
            (ConnectionState::Connecting, addr.clone()),
            (ConnectionState::Connected, addr.clone()),
            (ConnectionState::Disconnecting, addr.clone()),
            (ConnectionState::Disconnected, addr),
            (ConnectionState::Disconnected, None),
        ]
    );
    assert_eq!(manager.snapshot().attempt, AttemptId(2));
}
