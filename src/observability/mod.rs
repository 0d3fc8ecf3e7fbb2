//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! startup:
//!     environment.rs (detect managed runtime)
//!     → factory.rs (console sink + optional cloud sink)
//!     → logger.rs (StructuredLogger, shared by handle)
//!
//! per record:
//!     StructuredLogger::log
//!     → sink.rs   (ConsoleSink → tracing subscriber from logging.rs)
//!     → cloud.rs  (CloudSink → bounded queue → batch writer)
//!                 (tokens from credentials.rs)
//! ```
//!
//! # Design Decisions
//! - Sink list is fixed after startup
//! - Logging is fail-open: a lost record never fails a request
//! - Request ID flows through every access record
//! - Metrics are cheap and no-ops until an exporter is installed

pub mod cloud;
pub mod credentials;
pub mod environment;
pub mod factory;
pub mod latency;
pub mod logger;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use environment::Environment;
pub use latency::Latency;
pub use logger::StructuredLogger;
pub use record::{ErrorInfo, FieldValue, Fields, HttpRequestInfo, Level, LogRecord};
pub use sink::{ConsoleSink, LogSink, MemorySink, SinkError};
