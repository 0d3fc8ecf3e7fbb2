//! Startup helpers.
//!
//! # Responsibilities
//! - Pick the minimum record level for the detected environment
//! - Announce the process to the structured log once it is listening
//!
//! # Design Decisions
//! - An explicit configured level always wins
//! - Otherwise production logs at info, everything else at debug

use std::net::SocketAddr;

use crate::config::ObservabilityConfig;
use crate::observability::record::{Fields, Level};
use crate::observability::{Environment, StructuredLogger};

/// Minimum level for both the structured logger and the tracing filter.
pub fn min_log_level(config: &ObservabilityConfig, env: &Environment) -> Level {
    config
        .log_level
        .as_deref()
        .and_then(|level| level.parse().ok())
        .unwrap_or(if env.is_production() {
            Level::Info
        } else {
            Level::Debug
        })
}

/// Write the "Server starting" record.
pub fn announce(logger: &StructuredLogger, address: SocketAddr) {
    let concurrency = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    logger.info(
        "Server starting",
        Fields::new()
            .with("address", address.to_string())
            .with("port", u32::from(address.port()))
            .with("processConcurrency", concurrency),
    );
}
