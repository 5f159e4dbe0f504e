//! Configuration validation.
//!
//! Validates configuration at load time to catch common errors early.

use super::DccConfig;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("block_size must be greater than zero")]
    ZeroBlockSize,
    #[error("passive_poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
    #[error("max_line_length must be greater than zero")]
    ZeroLineLength,
    #[error("event_capacity must be greater than zero")]
    ZeroEventCapacity,
    #[error("unknown encoding label: {0}")]
    UnknownEncoding(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &DccConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.block_size == 0 {
        errors.push(ValidationError::ZeroBlockSize);
    }
    if config.passive_poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }
    if config.max_line_length == 0 {
        errors.push(ValidationError::ZeroLineLength);
    }
    if config.event_capacity == 0 {
        errors.push(ValidationError::ZeroEventCapacity);
    }
    if slirc_ctcp::ChatLineCodec::new(&config.encoding).is_err() {
        errors.push(ValidationError::UnknownEncoding(config.encoding.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
