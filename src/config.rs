//! Configuration management
//!
//! Handles loading and validating session configuration from TOML files.
//! Every section is optional; a missing file section falls back to defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Delay before the address is cleared after a disconnect
    #[serde(default = "default_grace_delay")]
    pub grace_delay_ms: u64,
}

impl SessionConfig {
    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_delay_ms: default_grace_delay(),
        }
    }
}

/// Which tunnel provider to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Simulated,
    Probe,
}

/// Tunnel provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    /// Simulated: time before each outcome is reported
    #[serde(default = "default_latency")]
    pub latency_ms: u64,
    /// Simulated: hosts whose connects fail
    #[serde(default)]
    pub fail_hosts: Vec<String>,
    /// Probe: TCP port to probe
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,
    /// Probe: connect timeout
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

impl ProviderConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            latency_ms: default_latency(),
            fail_hosts: Vec::new(),
            probe_port: default_probe_port(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus endpoint
    #[serde(default)]
    pub enabled: bool,
    /// Prometheus bind address
    #[serde(default = "default_metrics_addr")]
    pub bind_addr: SocketAddr,
    /// Enable JSON status API
    #[serde(default)]
    pub api_enabled: bool,
    /// Status API bind address
    #[serde(default = "default_api_addr")]
    pub api_bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_metrics_addr(),
            api_enabled: false,
            api_bind_addr: default_api_addr(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_grace_delay() -> u64 { 2000 }
fn default_provider_kind() -> ProviderKind { ProviderKind::Simulated }
fn default_latency() -> u64 { 300 }
fn default_probe_port() -> u16 { 443 }
fn default_probe_timeout() -> u64 { 3000 }
fn default_metrics_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 9090)) }
fn default_api_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 9091)) }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&contents)?;
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.session.grace_delay_ms == 0 {
            anyhow::bail!("session.grace_delay_ms must be > 0");
        }
        if self.provider.probe_port == 0 {
            anyhow::bail!("provider.probe_port must be > 0");
        }
        if self.provider.probe_timeout_ms == 0 {
            anyhow::bail!("provider.probe_timeout_ms must be > 0");
        }
        if self.metrics.enabled
            && self.metrics.api_enabled
            && self.metrics.bind_addr == self.metrics.api_bind_addr
        {
            anyhow::bail!("metrics.bind_addr and metrics.api_bind_addr must differ");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.session.grace_delay(), Duration::from_secs(2));
        assert_eq!(config.provider.kind, ProviderKind::Simulated);
        assert!(!config.metrics.enabled);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_toml(
            r#"
            [session]
            grace_delay_ms = 500

            [provider]
            kind = "probe"
            probe_port = 8443
            "#,
        )
        .unwrap();
        assert_eq!(config.session.grace_delay(), Duration::from_millis(500));
        assert_eq!(config.provider.kind, ProviderKind::Probe);
        assert_eq!(config.provider.probe_port, 8443);
        assert_eq!(config.provider.probe_timeout_ms, 3000);
    }

    #[test]
    fn test_rejects_zero_grace_delay() {
        let err = Config::from_toml("[session]\ngrace_delay_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("grace_delay_ms"));
    }
}
