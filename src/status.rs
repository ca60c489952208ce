//! Status presentation
//!
//! Maps session snapshots and errors to what the single-screen client shows:
//! a status line, its colour, the button title and the address field.

use serde::Serialize;

use crate::session::{ConnectionState, SessionError, SessionSnapshot, StateError, ValidationError};

/// Colour of the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Amber,
    Red,
}

/// Everything the status screen renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub status_text: String,
    pub color: StatusColor,
    pub button_title: &'static str,
    /// Contents of the address field; empty once cleared
    pub address_text: String,
    /// Button accepts presses
    pub button_enabled: bool,
}

/// Title and body of an error alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: &'static str,
    pub message: String,
}

impl StatusView {
    /// Alert to show when a request is refused
    pub fn alert_for(error: &SessionError) -> Alert {
        let message = match error {
            SessionError::Validation(ValidationError::Empty) => "Enter an IP address".to_string(),
            SessionError::Validation(ValidationError::Malformed) => {
                "Enter a valid IPv4, IPv6 address or hostname".to_string()
            }
            SessionError::State(StateError::Busy) => "Please wait for the current operation to finish".to_string(),
            SessionError::State(StateError::InvalidTransition) => {
                "Connect again to retry".to_string()
            }
            SessionError::Closed => "The connection service has stopped".to_string(),
        };
        Alert {
            title: "Error",
            message,
        }
    }
}

impl From<&SessionSnapshot> for StatusView {
    fn from(snapshot: &SessionSnapshot) -> Self {
        let (label, color, button_title, button_enabled) = match &snapshot.state {
            ConnectionState::Disconnected => ("Disabled".to_string(), StatusColor::Red, "Connect", true),
            ConnectionState::Connecting => ("Connecting…".to_string(), StatusColor::Amber, "Disconnect", true),
            ConnectionState::Connected => ("Connected".to_string(), StatusColor::Green, "Disconnect", true),
            ConnectionState::Disconnecting => {
                ("Disconnecting…".to_string(), StatusColor::Amber, "Disconnect", false)
            }
            ConnectionState::Failed(failure) => {
                (format!("Failed ({})", failure.reason), StatusColor::Red, "Connect", true)
            }
        };

        Self {
            status_text: format!("Statuses: {label}"),
            color,
            button_title,
            address_text: snapshot
                .address
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            button_enabled,
        }
    }
}

impl std::fmt::Display for StatusView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{:?}] [{}]", self.status_text, self.color, self.button_title)?;
        if !self.address_text.is_empty() {
            write!(f, " {}", self.address_text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Address, AttemptId, TunnelFailure};

    #[test]
    fn test_connected_view() {
        let view = StatusView::from(&SessionSnapshot {
            state: ConnectionState::Connected,
            address: Some(Address::parse("10.0.0.1").unwrap()),
            attempt: AttemptId(1),
        });
        assert_eq!(view.status_text, "Statuses: Connected");
        assert_eq!(view.color, StatusColor::Green);
        assert_eq!(view.button_title, "Disconnect");
        assert_eq!(view.address_text, "10.0.0.1");
    }

    #[test]
    fn test_disconnected_view_after_clear() {
        let view = StatusView::from(&SessionSnapshot::default());
        assert_eq!(view.status_text, "Statuses: Disabled");
        assert_eq!(view.color, StatusColor::Red);
        assert_eq!(view.button_title, "Connect");
        assert!(view.address_text.is_empty());
        assert_eq!(view.to_string(), "Statuses: Disabled [Red] [Connect]");
    }

    #[test]
    fn test_failed_view() {
        let view = StatusView::from(&SessionSnapshot {
            state: ConnectionState::Failed(TunnelFailure::new("timed out")),
            address: Some(Address::parse("vpn.example.com").unwrap()),
            attempt: AttemptId(4),
        });
        assert_eq!(view.status_text, "Statuses: Failed (timed out)");
        assert_eq!(view.button_title, "Connect");
        assert_eq!(view.address_text, "vpn.example.com");
    }

    #[test]
    fn test_alerts() {
        let alert = StatusView::alert_for(&ValidationError::Empty.into());
        assert_eq!(alert.title, "Error");
        assert_eq!(alert.message, "Enter an IP address");

        let alert = StatusView::alert_for(&StateError::Busy.into());
        assert!(alert.message.contains("wait"));
    }
}
