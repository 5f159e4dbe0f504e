//! Core configuration types and loading.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use super::validation::{ValidationError, validate};
use crate::session::AckMode;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// DCC configuration.
///
/// Every field has a default, so an empty file (or `DccConfig::default()`)
/// is a working configuration for loopback use.
#[derive(Debug, Clone, Deserialize)]
pub struct DccConfig {
    /// Address advertised to peers in active offers (default: 127.0.0.1).
    /// Behind NAT this is the public address.
    #[serde(default = "default_external_address")]
    pub external_address: Ipv4Addr,
    /// Local address DCC listeners bind to (default: 0.0.0.0).
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// File transfer block size in bytes (default: 8192).
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// How often a passive session re-checks for a connection or
    /// rejection, in milliseconds (default: 500).
    #[serde(default = "default_passive_poll_interval_ms")]
    pub passive_poll_interval_ms: u64,
    /// How long a finished upload waits for the receiver to hang up after
    /// the half-close, in milliseconds (default: 2000). Zero skips the wait.
    #[serde(default = "default_upload_linger_ms")]
    pub upload_linger_ms: u64,
    /// Acknowledgement mode for `send_path` uploads (default: rfc-send-ahead).
    #[serde(default = "default_ack_mode")]
    pub default_ack_mode: AckMode,
    /// Character encoding label for DCC CHAT lines (default: utf-8).
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Maximum DCC CHAT line length in bytes (default: 8192).
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Accept inbound chat offers without raising a request event.
    #[serde(default)]
    pub auto_accept_chat: bool,
    /// Event bus capacity per subscriber (default: 1024).
    /// Subscribers that fall further behind than this miss events.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Informational CTCP replies.
    #[serde(default)]
    pub ctcp: CtcpInfoConfig,
}

impl Default for DccConfig {
    fn default() -> Self {
        Self {
            external_address: default_external_address(),
            bind_address: default_bind_address(),
            block_size: default_block_size(),
            passive_poll_interval_ms: default_passive_poll_interval_ms(),
            upload_linger_ms: default_upload_linger_ms(),
            default_ack_mode: default_ack_mode(),
            encoding: default_encoding(),
            max_line_length: default_max_line_length(),
            auto_accept_chat: false,
            event_capacity: default_event_capacity(),
            ctcp: CtcpInfoConfig::default(),
        }
    }
}

impl DccConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DccConfig = toml::from_str(content)?;
        validate(&config).map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Passive wait interval as a `Duration`.
    pub fn passive_poll_interval(&self) -> Duration {
        Duration::from_millis(self.passive_poll_interval_ms)
    }

    /// Upload linger as a `Duration`.
    pub fn upload_linger(&self) -> Duration {
        Duration::from_millis(self.upload_linger_ms)
    }
}

/// Replies for the informational CTCP commands.
#[derive(Debug, Clone, Deserialize)]
pub struct CtcpInfoConfig {
    /// VERSION reply.
    #[serde(default = "default_version")]
    pub version: String,
    /// USERINFO reply.
    #[serde(default = "default_userinfo")]
    pub userinfo: String,
    /// URL reply.
    #[serde(default = "default_url")]
    pub url: String,
    /// SOURCE reply.
    #[serde(default = "default_source")]
    pub source: String,
    /// FINGER reply.
    #[serde(default = "default_finger")]
    pub finger: String,
}

impl Default for CtcpInfoConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            userinfo: default_userinfo(),
            url: default_url(),
            source: default_source(),
            finger: default_finger(),
        }
    }
}
