//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use pack_server::config::ServerConfig;
use pack_server::http::{HttpServer, PackError};
use pack_server::lifecycle::Shutdown;
use pack_server::observability::{Level, LogSink, MemorySink, StructuredLogger};
use pack_server::packing::{
    OutputFormat, PackInput, PackMetadata, PackOptions, PackResult, PackSummary, Packer,
};

pub const BOUNDARY: &str = "pack-server-test-boundary";

/// What the stub packer does when called.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(PackError),
    Panic,
}

/// Packer double that records its inputs.
pub struct StubPacker {
    behavior: Behavior,
    calls: AtomicUsize,
    last_client_ip: Mutex<Option<String>>,
}

impl StubPacker {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_client_ip: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_client_ip(&self) -> Option<String> {
        self.last_client_ip.lock().unwrap().clone()
    }
}

#[async_trait]
impl Packer for StubPacker {
    async fn pack(
        &self,
        input: PackInput,
        format: OutputFormat,
        _options: PackOptions,
        client_ip: &str,
    ) -> Result<PackResult, PackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_client_ip.lock().unwrap() = Some(client_ip.to_string());

        match &self.behavior {
            Behavior::Succeed => {
                let repository = match input {
                    PackInput::Remote { url } => url,
                    PackInput::Archive(archive) => archive.file_name,
                };
                Ok(PackResult {
                    content: "packed".to_string(),
                    format,
                    metadata: PackMetadata {
                        repository,
                        timestamp: "2024-01-01T00:00:00.000Z".to_string(),
                        summary: Some(PackSummary {
                            total_files: Some(3),
                            total_characters: Some(6),
                            total_tokens: Some(2),
                        }),
                    },
                })
            }
            Behavior::Fail(err) => Err(err.clone()),
            Behavior::Panic => panic!("packer blew up"),
        }
    }
}

/// A router wired like production, logging into memory.
pub struct TestApp {
    pub router: Router,
    pub sink: Arc<MemorySink>,
    pub packer: Arc<StubPacker>,
}

pub fn test_app(behavior: Behavior) -> TestApp {
    test_app_with_config(ServerConfig::default(), behavior)
}

pub fn test_app_with_config(config: ServerConfig, behavior: Behavior) -> TestApp {
    let sink = Arc::new(MemorySink::new());
    let logger = StructuredLogger::new(vec![sink.clone() as Arc<dyn LogSink>], Level::Debug);
    let packer = Arc::new(StubPacker::new(behavior));

    let server = HttpServer::new(config, logger, packer.clone());
    TestApp {
        router: server.router(),
        sink,
        packer,
    }
}

/// Multipart form part.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

/// Encode parts as a `multipart/form-data` body using [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/zip\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn pack_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/pack")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// A server listening on an ephemeral port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

pub async fn spawn_server(behavior: Behavior) -> RunningServer {
    let sink = Arc::new(MemorySink::new());
    let logger = StructuredLogger::new(vec![sink.clone() as Arc<dyn LogSink>], Level::Debug);
    let packer = Arc::new(StubPacker::new(behavior));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = HttpServer::new(ServerConfig::default(), logger, packer);
    let handle = tokio::spawn(server.run(listener, rx));

    RunningServer {
        addr,
        sink,
        shutdown,
        handle,
    }
}
