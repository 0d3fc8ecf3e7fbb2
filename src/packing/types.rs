//! Request and result types exchanged with the packer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::http::error::PackError;

/// Output style of the packed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Xml,
    Markdown,
    Plain,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Plain => "plain",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xml" => Ok(OutputFormat::Xml),
            "markdown" => Ok(OutputFormat::Markdown),
            "plain" => Ok(OutputFormat::Plain),
            _ => Err(PackError::UnsupportedFormat("Invalid format specified".into())),
        }
    }
}

/// Packing switches supplied by the client as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackOptions {
    pub remove_comments: bool,
    pub remove_empty_lines: bool,
    pub show_line_numbers: bool,
    pub file_summary: Option<bool>,
    pub directory_structure: Option<bool>,
    pub output_parsable: bool,
    pub compress: bool,
    pub include_patterns: Option<String>,
    pub ignore_patterns: Option<String>,
}

/// An uploaded repository archive.
#[derive(Debug, Clone)]
pub struct UploadedArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// What to pack.
#[derive(Debug, Clone)]
pub enum PackInput {
    Remote { url: String },
    Archive(UploadedArchive),
}

impl PackInput {
    /// Input kind for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PackInput::Remote { .. } => "url",
            PackInput::Archive(_) => "file",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackSummary {
    pub total_files: Option<u64>,
    pub total_characters: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackMetadata {
    pub repository: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PackSummary>,
}

/// Packed content returned to the client as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackResult {
    pub content: String,
    pub format: OutputFormat,
    pub metadata: PackMetadata,
}
