//! Log sinks.
//!
//! A sink accepts fully built [`LogRecord`]s. Sinks report failures through
//! [`SinkError`], but the logger discards them: a sink can lose records, it
//! can never fail a request.

use std::sync::Mutex;

use tokio::task::JoinHandle;

use crate::observability::record::{Level, LogRecord};

/// Failure to deliver a record to a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink initialization failed: {0}")]
    Init(String),

    #[error("sink queue is full")]
    Full,

    #[error("sink is closed")]
    Closed,

    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for structured log records.
pub trait LogSink: Send + Sync {
    /// Short name used in metrics labels.
    fn name(&self) -> &'static str;

    /// Deliver one record. Must not block on network I/O.
    fn accept(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Stop accepting records and hand back any background flush task.
    fn close(&self) -> Option<JoinHandle<()>> {
        None
    }
}

/// Local structured sink, bridged into the process `tracing` subscriber.
///
/// Output format (JSON or plain) and filtering follow whatever subscriber
/// [`init_tracing`](crate::observability::logging::init_tracing) installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

pub const CONSOLE_TARGET: &str = "pack_server::log";

macro_rules! console_event {
    ($level:expr, $record:expr, $http:expr, $error:expr, $fields:expr) => {
        tracing::event!(
            target: CONSOLE_TARGET,
            $level,
            request_id = $record.request_id.as_deref(),
            http_request = $http.as_deref(),
            error = $error.as_deref(),
            fields = $fields.as_deref(),
            "{}",
            $record.message
        )
    };
}

impl LogSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn accept(&self, record: &LogRecord) -> Result<(), SinkError> {
        let http = record
            .http_request
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let error = record.error.as_ref().map(serde_json::to_string).transpose()?;
        let fields = if record.fields.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.fields)?)
        };

        match record.level {
            Level::Debug => console_event!(tracing::Level::DEBUG, record, http, error, fields),
            Level::Info => console_event!(tracing::Level::INFO, record, http, error, fields),
            Level::Warn => console_event!(tracing::Level::WARN, record, http, error, fields),
            Level::Error => console_event!(tracing::Level::ERROR, record, http, error, fields),
        }
        Ok(())
    }
}

/// In-memory sink that keeps every accepted record.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records accepted so far, in emission order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Records carrying the given correlation id.
    pub fn records_for(&self, request_id: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.request_id.as_deref() == Some(request_id))
            .collect()
    }
}

impl LogSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn accept(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}
