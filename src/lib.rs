//! Repository packing API with request observability.
//!
//! Every request gets a correlation id, a "started" record and exactly one
//! terminal record. Failures become a stable JSON envelope. Records go to the
//! console and, in managed production environments, to the cloud log sink.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod packing;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use observability::StructuredLogger;
