//! Test doubles for the managed logging API and the metrics recorder.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use metrics::{
    Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const TEST_PRIVATE_KEY: &str = include_str!("testdata/service_account_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("testdata/service_account_pub.pem");

/// A service-account key file; `token_uri` defaults to the public endpoint.
pub fn service_account_json(token_uri: Option<&str>) -> String {
    let mut key = json!({
        "type": "service_account",
        "project_id": "acme",
        "private_key_id": "key-1",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "logger@acme.iam.gserviceaccount.com",
    });
    if let Some(uri) = token_uri {
        key["token_uri"] = json!(uri);
    }
    key.to_string()
}

/// One `entries:write` call as received.
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub authorization: Option<String>,
    pub body: Value,
}

impl RecordedWrite {
    pub fn entries(&self) -> &[Value] {
        self.body["entries"].as_array().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Clone, Default)]
struct StubState {
    metadata_requests: Arc<AtomicUsize>,
    assertions: Arc<Mutex<Vec<String>>>,
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
}

pub struct StubLoggingApi {
    addr: SocketAddr,
    state: StubState,
}

impl StubLoggingApi {
    pub const TOKEN: &'static str = "stub-token";

    pub async fn start() -> Self {
        let state = StubState::default();
        let app = Router::new()
            .route("/token", get(metadata_token).post(exchange_token))
            .route("/v2/entries-write", post(write_entries))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/v2/entries-write", self.addr)
    }

    pub fn metadata_requests(&self) -> usize {
        self.state.metadata_requests.load(Ordering::SeqCst)
    }

    pub fn assertions(&self) -> Vec<String> {
        self.state.assertions.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.writes.lock().unwrap().clone()
    }

    /// Poll until at least `count` writes arrived, or five seconds pass.
    pub async fn wait_for_writes(&self, count: usize) -> Vec<RecordedWrite> {
        for _ in 0..500 {
            let writes = self.writes();
            if writes.len() >= count {
                return writes;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.writes()
    }
}

fn token_body() -> Json<Value> {
    Json(json!({
        "access_token": StubLoggingApi::TOKEN,
        "expires_in": 3600,
        "token_type": "Bearer",
    }))
}

async fn metadata_token(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    if headers.get("metadata-flavor").and_then(|v| v.to_str().ok()) != Some("Google") {
        return Err(StatusCode::FORBIDDEN);
    }
    state.metadata_requests.fetch_add(1, Ordering::SeqCst);
    Ok(token_body())
}

async fn exchange_token(
    State(state): State<StubState>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if form.get("grant_type").map(String::as_str) != Some("urn:ietf:params:oauth:grant-type:jwt-bearer") {
        return Err(StatusCode::BAD_REQUEST);
    }
    let assertion = form.get("assertion").cloned().ok_or(StatusCode::BAD_REQUEST)?;
    state.assertions.lock().unwrap().push(assertion);
    Ok(token_body())
}

async fn write_entries(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.writes.lock().unwrap().push(RecordedWrite {
        authorization,
        body,
    });
    Json(json!({}))
}

/// Recorder that sums counter increments per metric key.
#[derive(Clone, Default)]
pub struct CountingRecorder {
    counters: Arc<Mutex<HashMap<Key, u64>>>,
}

impl CountingRecorder {
    /// Total across every label set.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.name() == name)
            .map(|(_, value)| *value)
            .sum()
    }

    /// Total for keys carrying all of `labels`.
    pub fn counter_with(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| {
                key.name() == name
                    && labels
                        .iter()
                        .all(|(k, v)| key.labels().any(|l| l.key() == *k && l.value() == *v))
            })
            .map(|(_, value)| *value)
            .sum()
    }
}

struct KeyedCounter {
    key: Key,
    counters: Arc<Mutex<HashMap<Key, u64>>>,
}

impl CounterFn for KeyedCounter {
    fn increment(&self, value: u64) {
        *self.counters.lock().unwrap().entry(self.key.clone()).or_default() += value;
    }

    fn absolute(&self, value: u64) {
        self.counters.lock().unwrap().insert(self.key.clone(), value);
    }
}

impl Recorder for CountingRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(KeyedCounter {
            key: key.clone(),
            counters: self.counters.clone(),
        }))
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
