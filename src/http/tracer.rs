//! Request tracing middleware.
//!
//! # Responsibilities
//! - Assign the correlation id and expose it to handlers
//! - Emit one "started" and exactly one terminal record per request
//! - Turn handler panics into enveloped 500 responses
//! - Stamp `x-request-id` on every response
//!
//! # Design Decisions
//! - The core (`RequestTracer::trace`) wraps any downstream future; the axum
//!   adapter (`trace_requests`) only handles ids, panics and headers
//! - The tracer never changes a response status
//! - A drop guard records requests whose future is dropped mid-flight

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::{
    body::HttpBody,
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;

use crate::http::request::{RequestContext, RequestId, X_REQUEST_ID};
use crate::http::response::ApiError;
use crate::observability::latency::{self, Latency};
use crate::observability::metrics;
use crate::observability::record::{ErrorInfo, Level, LogRecord};
use crate::observability::StructuredLogger;

/// A route handler panicked while producing a response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    pub message: String,
}

impl HandlerPanic {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

/// The request future was dropped before it produced a response.
#[derive(Debug, thiserror::Error)]
#[error("request cancelled")]
pub struct RequestCancelled;

/// Writes the access records for each request through the shared logger.
#[derive(Debug, Clone)]
pub struct RequestTracer {
    logger: StructuredLogger,
}

impl RequestTracer {
    pub fn new(logger: StructuredLogger) -> Self {
        Self { logger }
    }

    /// Run `downstream` between a "started" record and its terminal record.
    ///
    /// The downstream outcome is returned unchanged.
    pub async fn trace<Fut, E>(&self, ctx: &RequestContext, downstream: Fut) -> Result<Response, E>
    where
        Fut: Future<Output = Result<Response, E>>,
        E: std::error::Error + 'static,
    {
        let start = Instant::now();
        self.started(ctx);

        let mut in_flight = InFlight {
            tracer: self,
            ctx,
            start,
            settled: false,
        };

        let outcome = downstream.await;
        in_flight.settled = true;

        match &outcome {
            Ok(response) => self.completed(ctx, start, response),
            Err(err) => self.failed(ctx, start, err),
        }
        outcome
    }

    fn started(&self, ctx: &RequestContext) {
        self.logger.log(
            LogRecord::new(Level::Info, format!("{} {} started", ctx.method, ctx.path))
                .with_request_id(ctx.request_id.as_str())
                .with_http_request(ctx.http_request()),
        );
    }

    fn completed(&self, ctx: &RequestContext, start: Instant, response: &Response) {
        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        let mut http_request = ctx.http_request();
        http_request.status = Some(status);
        http_request.latency = Some(Latency::from_duration(elapsed));
        http_request.response_size = Some(response_size(response));

        self.logger.log(
            LogRecord::new(
                Level::Info,
                format!(
                    "{} {} completed in {}",
                    ctx.method,
                    ctx.path,
                    latency::render_duration(elapsed)
                ),
            )
            .with_request_id(ctx.request_id.as_str())
            .with_http_request(http_request),
        );
        metrics::record_request(ctx.method.as_str(), status, elapsed);
    }

    fn failed(&self, ctx: &RequestContext, start: Instant, err: &(dyn std::error::Error + 'static)) {
        let elapsed = start.elapsed();
        let error = ErrorInfo::from_error(err);

        let mut http_request = ctx.http_request();
        http_request.status = Some(500);
        http_request.latency = Some(Latency::from_duration(elapsed));

        self.logger.log(
            LogRecord::new(
                Level::Error,
                format!(
                    "{} {} failed: {} ({})",
                    ctx.method,
                    ctx.path,
                    error.message,
                    latency::render_duration(elapsed)
                ),
            )
            .with_request_id(ctx.request_id.as_str())
            .with_http_request(http_request)
            .with_error(error),
        );
        metrics::record_request(ctx.method.as_str(), 500, elapsed);
    }
}

/// Emits the terminal record if the request future is dropped early.
struct InFlight<'a> {
    tracer: &'a RequestTracer,
    ctx: &'a RequestContext,
    start: Instant,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.tracer.failed(self.ctx, self.start, &RequestCancelled);
        }
    }
}

/// Content-Length if present, else the exact body size hint, else 0.
fn response_size(response: &Response) -> u64 {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact())
        .unwrap_or(0)
}

/// Outermost middleware: ids, access records, panic capture.
pub async fn trace_requests(
    State(tracer): State<RequestTracer>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = RequestId::generate();
    request.extensions_mut().insert(request_id.clone());
    let ctx = RequestContext::from_request(&request, request_id.clone());

    let downstream = AssertUnwindSafe(next.run(request))
        .catch_unwind()
        .map(|outcome| outcome.map_err(HandlerPanic::from_payload));

    let mut response = match tracer.trace(&ctx, downstream).await {
        Ok(response) => response,
        Err(panic) => ApiError::from_failure(&panic, request_id.clone()).into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
