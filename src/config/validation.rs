//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check bind addresses parse as socket addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    BindAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "proxy.bind_address", &config.proxy.bind_address);
    check_addr(&mut errors, "control.bind_address", &config.control.bind_address);
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    check_nonzero(&mut errors, "proxy.max_connections", config.proxy.max_connections as u64);
    check_nonzero(&mut errors, "timeouts.connect_secs", config.timeouts.connect_secs);
    check_nonzero(&mut errors, "timeouts.exchange_secs", config.timeouts.exchange_secs);
    check_nonzero(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);
    check_nonzero(&mut errors, "limits.max_head_bytes", config.limits.max_head_bytes as u64);
    check_nonzero(&mut errors, "limits.max_body_bytes", config.limits.max_body_bytes as u64);
    check_nonzero(&mut errors, "relay.max_decode_bytes", config.relay.max_decode_bytes as u64);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_nonzero(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::ZeroValue { field });
    }
}
