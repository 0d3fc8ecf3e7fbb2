//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request tracing, timeouts, body limits)
//! - Bind server to listener
//! - Stop accepting on shutdown and drain in-flight requests

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;

use crate::config::ServerConfig;
use crate::http::pack::pack_handler;
use crate::http::timeout::enforce_timeout;
use crate::http::tracer::{trace_requests, RequestTracer};
use crate::observability::StructuredLogger;
use crate::packing::Packer;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub logger: StructuredLogger,
    pub packer: Arc<dyn Packer>,
}

/// HTTP server for the pack API.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig, logger: StructuredLogger, packer: Arc<dyn Packer>) -> Self {
        let tracer = RequestTracer::new(logger.clone());
        let state = AppState { logger, packer };

        let router = Self::build_router(&config, state, tracer);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The tracer is outermost so timeouts and body-limit rejections are
    /// still recorded against the request's id.
    fn build_router(config: &ServerConfig, state: AppState, tracer: RequestTracer) -> Router {
        let api = Router::new()
            .route("/api/pack", post(pack_handler))
            .layer(DefaultBodyLimit::max(config.limits.max_request_bytes));

        Router::new()
            .route("/health", get(health))
            .merge(api)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(middleware::from_fn_with_state(tracer, trace_requests))
                    .layer(middleware::from_fn_with_state(
                        Duration::from_secs(config.timeouts.request_secs),
                        enforce_timeout,
                    )),
            )
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> &'static str {
    "OK"
}
