//! Session error types

use serde::Serialize;
use thiserror::Error;

/// Rejected user input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("address is empty")]
    Empty,
    #[error("address is not a valid IPv4, IPv6 or hostname")]
    Malformed,
}

/// Request not allowed in the current connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// Another connect or disconnect is already in flight, or the tunnel is up
    #[error("session is busy")]
    Busy,
    #[error("request is not valid in the current state")]
    InvalidTransition,
}

/// Failure reported by the tunnel provider
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("tunnel failure: {reason}")]
pub struct TunnelFailure {
    pub reason: String,
}

impl TunnelFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Any error returned from a session request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateError),
    /// The session task has stopped
    #[error("session manager is closed")]
    Closed,
}
