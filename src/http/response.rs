//! Client-facing error responses.
//!
//! # Responsibilities
//! - Build the stable error envelope `{ error, requestId, timestamp }`
//! - Render classified failures as JSON responses
//!
//! # Design Decisions
//! - Envelopes carry the request's correlation id so users can report it
//! - No stack traces or internal causes ever reach the body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::http::error::{classify, ClassifiedError};
use crate::http::request::RequestId;

/// JSON body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub request_id: String,
    pub timestamp: String,
}

/// Stamp an envelope with the current time (ISO-8601, milliseconds, UTC).
pub fn build_envelope(message: impl Into<String>, request_id: impl Into<String>) -> ErrorEnvelope {
    ErrorEnvelope {
        error: message.into(),
        request_id: request_id.into(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// A classified failure bound to the request it belongs to.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub classified: ClassifiedError,
    pub request_id: RequestId,
}

impl ApiError {
    pub fn new(classified: ClassifiedError, request_id: RequestId) -> Self {
        Self {
            classified,
            request_id,
        }
    }

    /// Classify an arbitrary failure for this request.
    pub fn from_failure(failure: &(dyn std::error::Error + 'static), request_id: RequestId) -> Self {
        Self::new(classify(failure), request_id)
    }

    pub fn status(&self) -> StatusCode {
        self.classified.status
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        build_envelope(self.classified.message.clone(), self.request_id.as_str())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}
