//! Managed cloud log sink.
//!
//! # Responsibilities
//! - Convert records into Cloud Logging `LogEntry` JSON
//! - Queue entries without blocking the caller
//! - Batch and ship entries from a background task
//!
//! # Design Decisions
//! - `accept` is a `try_send` on a bounded queue; a full queue drops the record
//! - A failed batch write is logged and discarded, never retried
//! - Access tokens come from the explicit service-account key when one is
//!   configured, else from the instance metadata server (see `credentials.rs`)

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::config::CloudSinkConfig;
use crate::observability::credentials::{load_credentials, TokenError, TokenProvider, TokenSource};
use crate::observability::environment::Environment;
use crate::observability::record::{Level, LogRecord};
use crate::observability::sink::{LogSink, SinkError};

/// Sink that ships records to the managed logging API.
pub struct CloudSink {
    tx: mpsc::Sender<Value>,
    closing: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
    service: Option<String>,
}

impl CloudSink {
    /// Build the sink and spawn its writer task.
    ///
    /// Fails when no Tokio runtime is running, the project cannot be resolved,
    /// or the credentials file is unreadable, malformed or not a service-account
    /// key.
    pub fn connect(config: &CloudSinkConfig, env: &Environment) -> Result<Self, SinkError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SinkError::Init(format!("no async runtime: {}", e)))?;

        let (source, credentials_project) = match &env.credentials_path {
            Some(path) => {
                let loaded = load_credentials(path)?;
                (loaded.source, loaded.project_id)
            }
            None => (
                TokenSource::Metadata {
                    token_url: config.token_url.clone(),
                },
                None,
            ),
        };
        let project_id = env
            .project_id
            .clone()
            .or(credentials_project)
            .ok_or_else(|| SinkError::Init("cloud project id could not be resolved".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SinkError::Init(format!("http client: {}", e)))?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let closing = Arc::new(Notify::new());

        let writer = CloudWriter {
            client,
            endpoint: config.endpoint.clone(),
            log_name: format!("projects/{}/logs/{}", project_id, config.log_name),
            project_id,
            batch_size: config.batch_size,
            tokens: TokenProvider::new(source),
        };
        tracing::info!(
            log_name = %config.log_name,
            auth = writer.tokens.source().kind(),
            "Cloud log sink initialized"
        );

        let flush_interval = Duration::from_millis(config.flush_interval_ms);
        let worker = runtime.spawn(writer.run(rx, closing.clone(), flush_interval));

        Ok(Self {
            tx,
            closing,
            worker: Mutex::new(Some(worker)),
            service: env.service.clone(),
        })
    }
}

impl LogSink for CloudSink {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn accept(&self, record: &LogRecord) -> Result<(), SinkError> {
        let entry = to_log_entry(record, self.service.as_deref());
        self.tx.try_send(entry).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn close(&self) -> Option<JoinHandle<()>> {
        self.closing.notify_one();
        self.worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

fn severity(level: Level) -> &'static str {
    match level {
        Level::Debug => "DEBUG",
        Level::Info => "INFO",
        Level::Warn => "WARNING",
        Level::Error => "ERROR",
    }
}

/// Convert a record into a Cloud Logging `LogEntry`.
pub fn to_log_entry(record: &LogRecord, service: Option<&str>) -> Value {
    let mut payload = Map::new();
    payload.insert("message".into(), Value::String(record.message.clone()));
    if let Some(error) = &record.error {
        payload.insert("error".into(), json!(error));
    }
    for (key, value) in record.fields.iter() {
        payload.insert(key.clone(), json!(value));
    }

    let mut entry = Map::new();
    entry.insert("severity".into(), json!(severity(record.level)));
    entry.insert(
        "timestamp".into(),
        json!(record.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)),
    );
    entry.insert("jsonPayload".into(), Value::Object(payload));

    let mut labels = Map::new();
    if let Some(id) = &record.request_id {
        labels.insert("requestId".into(), json!(id));
    }
    if let Some(service) = service {
        labels.insert("service".into(), json!(service));
    }
    if !labels.is_empty() {
        entry.insert("labels".into(), Value::Object(labels));
    }

    if let Some(http) = &record.http_request {
        let mut req = Map::new();
        req.insert("requestMethod".into(), json!(http.request_method));
        req.insert("requestUrl".into(), json!(http.request_url));
        req.insert("remoteIp".into(), json!(http.remote_ip));
        if let Some(status) = http.status {
            req.insert("status".into(), json!(status));
        }
        if let Some(latency) = http.latency {
            // Duration in the API's string form: "<seconds>.<nanos>s"
            req.insert(
                "latency".into(),
                json!(format!("{}.{:09}s", latency.seconds, latency.nanos)),
            );
        }
        if let Some(size) = http.response_size {
            // int64 fields travel as strings
            req.insert("responseSize".into(), json!(size.to_string()));
        }
        if let Some(ua) = &http.user_agent {
            req.insert("userAgent".into(), json!(ua));
        }
        if let Some(referer) = &http.referer {
            req.insert("referer".into(), json!(referer));
        }
        entry.insert("httpRequest".into(), Value::Object(req));
    }

    Value::Object(entry)
}

#[derive(Debug, thiserror::Error)]
enum WriteError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("write request failed: {0}")]
    Write(#[from] reqwest::Error),
}

struct CloudWriter {
    client: reqwest::Client,
    endpoint: String,
    log_name: String,
    project_id: String,
    batch_size: usize,
    tokens: TokenProvider,
}

impl CloudWriter {
    async fn run(mut self, mut rx: mpsc::Receiver<Value>, closing: Arc<Notify>, flush_every: Duration) {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + flush_every, flush_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                entry = rx.recv() => match entry {
                    Some(entry) => {
                        batch.push(entry);
                        if batch.len() >= self.batch_size {
                            self.flush(&mut batch).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        self.flush(&mut batch).await;
                    }
                }
                _ = closing.notified() => {
                    rx.close();
                    while let Ok(entry) = rx.try_recv() {
                        batch.push(entry);
                    }
                    break;
                }
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch).await;
        }
        tracing::debug!("Cloud log writer stopped");
    }

    async fn flush(&mut self, batch: &mut Vec<Value>) {
        let entries = std::mem::take(batch);
        let count = entries.len();
        if let Err(e) = self.write(entries).await {
            tracing::warn!(error = %e, dropped = count, "Cloud log write failed, entries discarded");
            crate::observability::metrics::record_dropped_log("cloud", count as u64);
        }
    }

    async fn write(&mut self, entries: Vec<Value>) -> Result<(), WriteError> {
        let token = self.tokens.access_token(&self.client).await?;
        let body = json!({
            "logName": self.log_name,
            "resource": { "type": "global", "labels": { "project_id": self.project_id } },
            "entries": entries,
        });
        self.client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::latency::Latency;
    use crate::observability::logger::StructuredLogger;
    use crate::observability::record::{ErrorInfo, Fields, HttpRequestInfo};
    use crate::observability::testing::{service_account_json, CountingRecorder, StubLoggingApi};
    use std::io::Write;

    fn production_env(project: Option<&str>, credentials: Option<&std::path::Path>) -> Environment {
        let credentials = credentials.map(|p| p.display().to_string());
        Environment::from_lookup(&crate::config::EnvironmentConfig::default(), |name| match name {
            "GOOGLE_CLOUD_PROJECT" => project.map(String::from),
            "K_SERVICE" => Some("pack-api".into()),
            "GOOGLE_APPLICATION_CREDENTIALS" => credentials.clone(),
            "NODE_ENV" => Some("production".into()),
            _ => None,
        })
    }

    fn unreachable_config() -> CloudSinkConfig {
        CloudSinkConfig {
            endpoint: "http://127.0.0.1:9/v2/entries:write".into(),
            token_url: "http://127.0.0.1:9/token".into(),
            request_timeout_secs: 1,
            ..CloudSinkConfig::default()
        }
    }

    #[test]
    fn test_entry_conversion() {
        let record = LogRecord::new(Level::Error, "POST /api/pack failed")
            .with_request_id("req-9")
            .with_error(ErrorInfo { message: "boom".into(), stack: None })
            .with_fields(Fields::new().with("format", "xml"))
            .with_http_request(HttpRequestInfo {
                request_method: "POST".into(),
                request_url: "http://localhost/api/pack".into(),
                status: Some(500),
                latency: Some(Latency::from_millis(1500)),
                response_size: Some(120),
                user_agent: Some("curl/8".into()),
                referer: None,
                remote_ip: "1.2.3.4".into(),
            });

        let entry = to_log_entry(&record, Some("pack-api"));
        assert_eq!(entry["severity"], "ERROR");
        assert_eq!(entry["labels"]["requestId"], "req-9");
        assert_eq!(entry["labels"]["service"], "pack-api");
        assert_eq!(entry["jsonPayload"]["message"], "POST /api/pack failed");
        assert_eq!(entry["jsonPayload"]["error"]["message"], "boom");
        assert_eq!(entry["jsonPayload"]["format"], "xml");
        assert_eq!(entry["httpRequest"]["latency"], "1.500000000s");
        assert_eq!(entry["httpRequest"]["responseSize"], "120");
        assert_eq!(entry["httpRequest"]["status"], 500);
        assert!(entry["httpRequest"].get("referer").is_none());
    }

    #[test]
    fn test_connect_requires_runtime() {
        let result = CloudSink::connect(&unreachable_config(), &production_env(Some("acme"), None));
        assert!(matches!(result, Err(SinkError::Init(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_credentials() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let env = production_env(None, Some(file.path()));
        let result = CloudSink::connect(&unreachable_config(), &env);
        assert!(matches!(result, Err(SinkError::Init(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_unsupported_credentials() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"type":"authorized_user","project_id":"acme"}}"#).unwrap();

        let env = production_env(None, Some(file.path()));
        let result = CloudSink::connect(&unreachable_config(), &env);
        assert!(matches!(result, Err(SinkError::Init(_))));
    }

    #[tokio::test]
    async fn test_connect_without_project_fails() {
        let result = CloudSink::connect(&unreachable_config(), &production_env(None, None));
        assert!(matches!(result, Err(SinkError::Init(_))));
    }

    fn stub_config(api: &StubLoggingApi) -> CloudSinkConfig {
        CloudSinkConfig {
            endpoint: api.endpoint(),
            token_url: api.token_url(),
            request_timeout_secs: 5,
            flush_interval_ms: 60_000,
            ..CloudSinkConfig::default()
        }
    }

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Level::Info, message).with_request_id("req-1")
    }

    async fn finish(sink: &CloudSink) {
        let worker = sink.close().expect("worker handle");
        tokio::time::timeout(Duration::from_secs(10), worker)
            .await
            .expect("writer drained")
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_batches_are_written_with_one_token() {
        let api = StubLoggingApi::start().await;
        let config = CloudSinkConfig {
            batch_size: 2,
            ..stub_config(&api)
        };
        let sink = CloudSink::connect(&config, &production_env(Some("acme"), None)).unwrap();

        for message in ["one", "two", "three", "four"] {
            sink.accept(&record(message)).unwrap();
        }

        let writes = api.wait_for_writes(2).await;
        assert_eq!(writes.len(), 2);
        for write in &writes {
            assert_eq!(write.authorization.as_deref(), Some("Bearer stub-token"));
            assert_eq!(write.entries().len(), 2);
            assert_eq!(write.body["logName"], "projects/acme/logs/pack-server");
            assert_eq!(write.body["resource"]["labels"]["project_id"], "acme");
        }
        assert_eq!(writes[0].entries()[0]["jsonPayload"]["message"], "one");
        assert_eq!(writes[1].entries()[1]["jsonPayload"]["message"], "four");
        assert_eq!(writes[0].entries()[0]["labels"]["requestId"], "req-1");
        assert_eq!(writes[0].entries()[0]["labels"]["service"], "pack-api");

        assert_eq!(api.metadata_requests(), 1);
        assert!(api.assertions().is_empty());
        finish(&sink).await;
        assert_eq!(api.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_batch_is_written_on_interval() {
        let api = StubLoggingApi::start().await;
        let config = CloudSinkConfig {
            flush_interval_ms: 50,
            ..stub_config(&api)
        };
        let sink = CloudSink::connect(&config, &production_env(Some("acme"), None)).unwrap();

        sink.accept(&record("lonely")).unwrap();

        let writes = api.wait_for_writes(1).await;
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].entries().len(), 1);
        assert_eq!(writes[0].entries()[0]["jsonPayload"]["message"], "lonely");
        finish(&sink).await;
    }

    #[tokio::test]
    async fn test_close_flushes_queued_entries() {
        let api = StubLoggingApi::start().await;
        let sink = CloudSink::connect(&stub_config(&api), &production_env(Some("acme"), None)).unwrap();

        for message in ["a", "b", "c"] {
            sink.accept(&record(message)).unwrap();
        }
        finish(&sink).await;

        let writes = api.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].entries().len(), 3);
        assert!(sink.close().is_none());
        assert!(matches!(sink.accept(&record("late")), Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn test_full_queue_drops_records() {
        let api = StubLoggingApi::start().await;
        let config = CloudSinkConfig {
            queue_capacity: 1,
            ..stub_config(&api)
        };
        let sink = Arc::new(CloudSink::connect(&config, &production_env(Some("acme"), None)).unwrap());

        // the writer task has not run yet on this single-threaded runtime
        sink.accept(&record("kept")).unwrap();
        assert!(matches!(sink.accept(&record("dropped")), Err(SinkError::Full)));

        let recorder = CountingRecorder::default();
        let logger = StructuredLogger::new(vec![sink.clone() as Arc<dyn LogSink>], Level::Debug);
        metrics::with_local_recorder(&recorder, || logger.info("also dropped", Fields::new()));
        assert_eq!(recorder.counter("pack_log_records_dropped_total"), 1);

        finish(&sink).await;
        let writes = api.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].entries().len(), 1);
        assert_eq!(writes[0].entries()[0]["jsonPayload"]["message"], "kept");
    }

    #[tokio::test]
    async fn test_service_account_key_authorizes_writes() {
        let api = StubLoggingApi::start().await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", service_account_json(Some(&api.token_url()))).unwrap();

        let env = production_env(None, Some(file.path()));
        let sink = CloudSink::connect(&stub_config(&api), &env).unwrap();
        sink.accept(&record("signed")).unwrap();
        sink.accept(&record("again")).unwrap();
        finish(&sink).await;

        let writes = api.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].authorization.as_deref(), Some("Bearer stub-token"));
        assert_eq!(writes[0].body["logName"], "projects/acme/logs/pack-server");
        assert_eq!(api.assertions().len(), 1);
        assert_eq!(api.metadata_requests(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_still_drains() {
        let config = CloudSinkConfig {
            batch_size: 2,
            ..unreachable_config()
        };
        let sink = CloudSink::connect(&config, &production_env(Some("acme"), None)).unwrap();
        sink.accept(&record("lost")).unwrap();

        // nothing listens on the discard port; the drain must still terminate
        let worker = sink.close().expect("worker handle");
        let _ = tokio::time::timeout(Duration::from_secs(10), worker).await;
        assert!(sink.close().is_none());
    }
}
