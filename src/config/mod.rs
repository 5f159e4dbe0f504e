//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (DccConfig, CtcpInfoConfig)
//! - [`defaults`]: Default value functions used by serde
//! - [`validation`]: Startup validation of loaded values

mod defaults;
mod types;
mod validation;

pub use types::{ConfigError, CtcpInfoConfig, DccConfig};
pub use validation::{ValidationError, validate};
