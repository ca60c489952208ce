//! Session management
//!
//! Validates target addresses, owns the connection state machine and
//! notifies subscribers of every change.

mod address;
mod error;
mod machine;
mod manager;
mod state;
mod subscribers;

pub use address::{Address, AddressKind};
pub use error::{SessionError, StateError, TunnelFailure, ValidationError};
pub use machine::{GraceClear, SessionCore};
pub use manager::{SessionManager, SessionManagerConfig};
pub use state::{AttemptId, ConnectionState, SessionSnapshot, TunnelOutcome};
pub use subscribers::{StateObserver, StateSubscriber, SubscriberRegistry, SubscriptionHandle};

pub(crate) use manager::Command;
