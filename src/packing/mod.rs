//! Packing collaborator boundary.
//!
//! # Data Flow
//! ```text
//! POST /api/pack (multipart form)
//!     → http::pack (parse form, validate, resolve client IP)
//!     → Packer::pack(input, format, options, client_ip)
//!     → PackResult { content, format, metadata } or PackError
//! ```
//!
//! The packing engine is opaque here; [`command::CommandPacker`] is the default
//! implementation wired by the binary.

pub mod command;
pub mod types;

pub use command::CommandPacker;
pub use types::{OutputFormat, PackInput, PackMetadata, PackOptions, PackResult, PackSummary, UploadedArchive};

use async_trait::async_trait;

use crate::http::error::PackError;

/// Turns a repository (remote URL or uploaded archive) into packed content.
#[async_trait]
pub trait Packer: Send + Sync {
    async fn pack(
        &self,
        input: PackInput,
        format: OutputFormat,
        options: PackOptions,
        client_ip: &str,
    ) -> Result<PackResult, PackError>;
}
