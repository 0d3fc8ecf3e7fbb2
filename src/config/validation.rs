//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sizes > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;
use crate::observability::record::Level;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("observability.log_level: {0}")]
    InvalidLogLevel(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if let Some(level) = &config.observability.log_level {
        if let Err(e) = level.parse::<Level>() {
            errors.push(ValidationError::InvalidLogLevel(e));
        }
    }

    let positive = [
        ("timeouts.request_secs", config.timeouts.request_secs as usize),
        ("limits.max_request_bytes", config.limits.max_request_bytes),
        ("logging.cloud.queue_capacity", config.logging.cloud.queue_capacity),
        ("logging.cloud.batch_size", config.logging.cloud.batch_size),
        ("logging.cloud.flush_interval_ms", config.logging.cloud.flush_interval_ms as usize),
        ("logging.cloud.request_timeout_secs", config.logging.cloud.request_timeout_secs as usize),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let required = [
        ("logging.environment.mode_var", &config.logging.environment.mode_var),
        ("logging.environment.credentials_var", &config.logging.environment.credentials_var),
        ("logging.cloud.log_name", &config.logging.cloud.log_name),
        ("packer.command", &config.packer.command),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::Empty { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
