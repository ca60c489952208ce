//! Session state

use serde::Serialize;

use super::address::Address;
use super::error::TunnelFailure;

/// Identifies one connect or disconnect attempt.
///
/// Strictly increasing over the life of a session manager; a provider event
/// carrying anything but the current id is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct AttemptId(pub u64);

impl AttemptId {
    /// Create from raw u64
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The id that follows this one
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Quiescent, no tunnel
    #[default]
    Disconnected,
    /// Connect requested, waiting for the provider
    Connecting,
    /// Tunnel is up
    Connected,
    /// Disconnect requested, waiting for the provider
    Disconnecting,
    /// Last attempt failed; a new connect retries
    Failed(TunnelFailure),
}

impl ConnectionState {
    /// Waiting on a provider outcome
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }

    /// A connect request would be accepted from here
    pub fn accepts_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed(_))
    }

    /// Short lowercase name, used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Failed(_) => "failed",
        }
    }
}

/// Outcome a provider reports for an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelOutcome {
    Success,
    Failure(TunnelFailure),
}

impl TunnelOutcome {
    /// Shorthand for a failure outcome
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure(TunnelFailure::new(reason))
    }
}

/// What observers see after every change
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    /// Current state
    pub state: ConnectionState,
    /// Address shown to the user; `None` once cleared
    pub address: Option<Address>,
    /// Most recently issued attempt
    pub attempt: AttemptId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert!(snapshot.address.is_none());
        assert_eq!(snapshot.attempt, AttemptId(0));
    }

    #[test]
    fn test_accepts_connect() {
        assert!(ConnectionState::Disconnected.accepts_connect());
        assert!(ConnectionState::Failed(TunnelFailure::new("x")).accepts_connect());
        assert!(!ConnectionState::Connecting.accepts_connect());
        assert!(!ConnectionState::Connected.accepts_connect());
        assert!(!ConnectionState::Disconnecting.accepts_connect());
    }

    #[test]
    fn test_serialize_failed_state() {
        let state = ConnectionState::Failed(TunnelFailure::new("timed out"));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "timed out");
    }
}
