//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::{IpAddr, Ipv4Addr};

use crate::session::AckMode;

// =============================================================================
// Network Defaults
// =============================================================================

pub fn default_external_address() -> Ipv4Addr {
    Ipv4Addr::LOCALHOST
}

pub fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

// =============================================================================
// Transfer Defaults
// =============================================================================

pub fn default_block_size() -> usize {
    8192
}

pub fn default_passive_poll_interval_ms() -> u64 {
    500
}

pub fn default_upload_linger_ms() -> u64 {
    2000
}

pub fn default_ack_mode() -> AckMode {
    AckMode::RfcSendAhead
}

// =============================================================================
// Chat Defaults
// =============================================================================

pub fn default_encoding() -> String {
    "utf-8".to_string()
}

pub fn default_max_line_length() -> usize {
    8192
}

// =============================================================================
// Event Defaults
// =============================================================================

pub fn default_event_capacity() -> usize {
    1024
}

// =============================================================================
// CTCP Reply Defaults
// =============================================================================

pub fn default_version() -> String {
    format!("slirc-dcc {} / Rust", env!("CARGO_PKG_VERSION"))
}

pub fn default_userinfo() -> String {
    "No user info given.".to_string()
}

pub fn default_url() -> String {
    env!("CARGO_PKG_REPOSITORY").to_string()
}

pub fn default_source() -> String {
    env!("CARGO_PKG_REPOSITORY").to_string()
}

pub fn default_finger() -> String {
    "slirc-dcc user".to_string()
}
