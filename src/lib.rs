//! Tunnel Session - connection session manager
//!
//! This library provides the session layer of a tunnel client: address
//! validation, the connect/disconnect state machine, subscriber
//! notification and the provider interface the platform tunnel plugs into.

pub mod config;
pub mod metrics;
pub mod provider;
pub mod session;
pub mod status;
pub mod util;

pub use config::Config;
pub use provider::{TunnelEventSink, TunnelProvider};
pub use session::{ConnectionState, SessionError, SessionManager, SessionManagerConfig, SessionSnapshot};
pub use status::StatusView;

/// Crate version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
