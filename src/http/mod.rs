//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → tracer.rs (request ID, started record, panic capture)
//!     → timeout.rs (deadline, 504 envelope on expiry)
//!     → routes: /health, /api/pack (pack.rs)
//!     → error.rs + response.rs (classify failure, JSON envelope)
//!     → tracer.rs (terminal record, x-request-id header)
//!     → Send to client
//! ```

pub mod error;
pub mod pack;
pub mod request;
pub mod response;
pub mod server;
pub mod timeout;
pub mod tracer;

pub use error::{classify, ClassifiedError, PackError, RequestTimeout};
pub use request::{resolve_client_ip, RequestContext, RequestId, UNKNOWN_CLIENT_IP, X_REQUEST_ID};
pub use response::{build_envelope, ApiError, ErrorEnvelope};
pub use server::{AppState, HttpServer};
pub use tracer::{trace_requests, HandlerPanic, RequestTracer};
