//! Request deadline middleware.
//!
//! # Design Decisions
//! - Sits inside the tracer, so a timed-out request still gets its id,
//!   an `x-request-id` header and a terminal access record
//! - Expiry answers 504 with the standard error envelope

use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::RequestTimeout;
use crate::http::request::RequestId;
use crate::http::response::ApiError;

/// Drop the downstream future once `limit` has passed.
pub async fn enforce_timeout(
    State(limit): State<Duration>,
    request_id: RequestId,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(request_id = %request_id, limit = ?limit, "Request timed out");
            ApiError::from_failure(&RequestTimeout { limit }, request_id).into_response()
        }
    }
}
