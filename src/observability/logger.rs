//! Structured logger.
//!
//! # Responsibilities
//! - Own the fixed sink list chosen at startup
//! - Fan each record out to every sink
//! - Isolate sink failures from callers
//!
//! # Design Decisions
//! - Created once in `main` and handed to subsystems explicitly
//! - Cloning is cheap (shared `Arc` of sinks); no locks on the write path
//! - Sink errors and sink panics are swallowed at the per-sink boundary

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LoggingConfig;
use crate::observability::environment::Environment;
use crate::observability::factory::build_sinks;
use crate::observability::metrics;
use crate::observability::record::{Fields, Level, LogRecord};
use crate::observability::sink::LogSink;

/// Process-wide handle over the configured sinks.
#[derive(Clone)]
pub struct StructuredLogger {
    sinks: Arc<[Arc<dyn LogSink>]>,
    min_level: Level,
}

impl StructuredLogger {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>, min_level: Level) -> Self {
        Self {
            sinks: sinks.into(),
            min_level,
        }
    }

    /// Select sinks for the detected environment.
    pub fn from_environment(env: &Environment, config: &LoggingConfig, min_level: Level) -> Self {
        Self::new(build_sinks(env, config), min_level)
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Deliver a record to every sink. Never fails.
    pub fn log(&self, record: LogRecord) {
        if record.level < self.min_level {
            return;
        }

        for sink in self.sinks.iter() {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| sink.accept(&record)));
            if !matches!(delivered, Ok(Ok(()))) {
                metrics::record_dropped_log(sink.name(), 1);
            }
        }
    }

    pub fn debug(&self, message: impl Into<String>, fields: Fields) {
        self.log(LogRecord::new(Level::Debug, message).with_fields(fields));
    }

    pub fn info(&self, message: impl Into<String>, fields: Fields) {
        self.log(LogRecord::new(Level::Info, message).with_fields(fields));
    }

    pub fn warn(&self, message: impl Into<String>, fields: Fields) {
        self.log(LogRecord::new(Level::Warn, message).with_fields(fields));
    }

    pub fn error(&self, message: impl Into<String>, fields: Fields) {
        self.log(LogRecord::new(Level::Error, message).with_fields(fields));
    }

    /// Stop sinks with background writers and wait for them to drain.
    pub async fn close(&self, deadline: Duration) {
        let workers: Vec<_> = self.sinks.iter().filter_map(|s| s.close()).collect();
        if workers.is_empty() {
            return;
        }

        let drain = futures_util::future::join_all(workers);
        if tokio::time::timeout(deadline, drain).await.is_err() {
            tracing::warn!(deadline = ?deadline, "Log sinks did not drain before deadline");
        }
    }
}

impl std::fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("sinks", &self.sink_names())
            .field("min_level", &self.min_level)
            .finish()
    }
}
