//! Failure taxonomy and classification.
//!
//! # Responsibilities
//! - Define the domain failures route handlers surface
//! - Map any failure, typed or not, to a client-safe message and status
//!
//! # Design Decisions
//! - `classify` is total: unrecognized failures become 500 "Internal server error"
//! - The error and its `source()` chain are searched; the first recognized
//!   category wins
//! - Messages come from our own variants, never from `Debug` output or causes

use std::time::Duration;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";
pub const PAYLOAD_TOO_LARGE: &str = "File size too large";
pub const INVALID_FORM_DATA: &str = "Invalid form data";
pub const INVALID_OPTIONS: &str = "Invalid options format";
pub const REQUEST_TIMEOUT: &str = "Request timed out";

/// The request did not finish within the configured deadline.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("request timed out after {limit:?}")]
pub struct RequestTimeout {
    pub limit: Duration,
}

/// Failures raised while handling a pack request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    /// Client input is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Request body exceeded the configured limit.
    #[error("File size too large")]
    PayloadTooLarge,

    /// Requested output format is not supported.
    #[error("{0}")]
    UnsupportedFormat(String),

    /// A remote dependency (repository host, packing tool) failed.
    #[error("{0}")]
    Upstream(String),

    /// Packing ran but could not produce a result.
    #[error("{0}")]
    Processing(String),

    /// Anything else; the message stays internal.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PackError {
    pub fn status(&self) -> StatusCode {
        match self {
            PackError::Validation(_) | PackError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            PackError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            PackError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PackError::Processing(_) | PackError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            PackError::Internal(_) => INTERNAL_SERVER_ERROR.to_string(),
            other => other.to_string(),
        }
    }
}

/// Client-facing message and HTTP status derived from a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub message: String,
    pub status: StatusCode,
}

impl ClassifiedError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn internal() -> Self {
        Self::new(INTERNAL_SERVER_ERROR, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }
}

impl From<&PackError> for ClassifiedError {
    fn from(err: &PackError) -> Self {
        Self::new(err.public_message(), err.status())
    }
}

/// Map any failure to a message and a status in `400..=599`.
pub fn classify(failure: &(dyn std::error::Error + 'static)) -> ClassifiedError {
    std::iter::successors(Some(failure), |e| e.source())
        .find_map(recognize)
        .filter(|c| c.status.is_client_error() || c.status.is_server_error())
        .unwrap_or_else(ClassifiedError::internal)
}

fn recognize(err: &(dyn std::error::Error + 'static)) -> Option<ClassifiedError> {
    if let Some(pack) = err.downcast_ref::<PackError>() {
        return Some(pack.into());
    }
    if let Some(multipart) = err.downcast_ref::<MultipartError>() {
        return Some(if multipart.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ClassifiedError::new(PAYLOAD_TOO_LARGE, StatusCode::PAYLOAD_TOO_LARGE)
        } else {
            ClassifiedError::new(INVALID_FORM_DATA, StatusCode::BAD_REQUEST)
        });
    }
    if err.downcast_ref::<RequestTimeout>().is_some() {
        return Some(ClassifiedError::new(REQUEST_TIMEOUT, StatusCode::GATEWAY_TIMEOUT));
    }
    if err.downcast_ref::<serde_json::Error>().is_some() {
        return Some(ClassifiedError::new(INVALID_OPTIONS, StatusCode::BAD_REQUEST));
    }
    None
}
