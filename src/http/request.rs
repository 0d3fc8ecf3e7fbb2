//! Request identification and metadata.
//!
//! # Responsibilities
//! - Generate the per-request correlation id
//! - Resolve the client IP from proxy headers
//! - Capture the request metadata written to access records
//!
//! # Design Decisions
//! - Request ID assigned as early as possible (outermost middleware)
//! - Stored in request extensions; handlers read it with the `RequestId` extractor
//! - Client IP precedence: X-Forwarded-For (first hop), X-Real-IP,
//!   CF-Connecting-IP, then `0.0.0.0`

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderName, Method, Request},
};
use rand::Rng;

use crate::observability::record::HttpRequestInfo;

/// Response header carrying the correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Client IP reported when no proxy header is present.
pub const UNKNOWN_CLIENT_IP: &str = "0.0.0.0";

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Correlation id for one request: `req-<unix millis>-<9 base36 chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();

        Self(format!("req-{}-{}", millis, suffix).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0.to_string()
    }
}

/// Handlers behind the request tracer always find an id; elsewhere a fresh one
/// is generated.
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(RequestId::generate))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Best-effort client IP from proxy headers.
pub fn resolve_client_ip(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .or_else(|| header_str(headers, "cf-connecting-ip"))
        .unwrap_or(UNKNOWN_CLIENT_IP)
        .to_string()
}

/// Request metadata captured at entry and repeated on every access record.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub url: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub remote_ip: String,
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>, request_id: RequestId) -> Self {
        let headers = request.headers();
        let uri = request.uri();

        let url = if uri.scheme().is_some() {
            uri.to_string()
        } else {
            let scheme = header_str(headers, "x-forwarded-proto").unwrap_or("http");
            let host = header_str(headers, header::HOST.as_str()).unwrap_or("localhost");
            let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
            format!("{}://{}{}", scheme, host, path_and_query)
        };

        Self {
            request_id,
            method: request.method().clone(),
            path: uri.path().to_string(),
            url,
            user_agent: header_str(headers, header::USER_AGENT.as_str()).map(String::from),
            referer: header_str(headers, header::REFERER.as_str()).map(String::from),
            remote_ip: resolve_client_ip(headers),
        }
    }

    /// `httpRequest` block without response data.
    pub fn http_request(&self) -> HttpRequestInfo {
        HttpRequestInfo {
            request_method: self.method.to_string(),
            request_url: self.url.clone(),
            status: None,
            latency: None,
            response_size: None,
            user_agent: self.user_agent.clone(),
            referer: self.referer.clone(),
            remote_ip: self.remote_ip.clone(),
        }
    }
}
