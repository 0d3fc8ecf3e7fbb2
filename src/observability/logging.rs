//! Process diagnostics via `tracing`.
//!
//! The console sink forwards structured records into the subscriber
//! installed here, so local output has a single format.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::observability::record::Level;

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(level: Level) -> String {
    format!("pack_server={level}", level = level.as_str())
}

/// Install the global subscriber: JSON lines in production, plain text otherwise.
pub fn init_tracing(level: Level, json: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(level).into());

    let (json_layer, plain_layer) = if json {
        (Some(fmt::layer().json().flatten_event(true)), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .try_init()
}
