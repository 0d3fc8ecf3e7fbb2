//! Packer backed by an external packing CLI.

use std::process::Stdio;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::process::Command;

use crate::config::PackerConfig;
use crate::http::error::PackError;
use crate::packing::types::{OutputFormat, PackInput, PackMetadata, PackOptions, PackResult, PackSummary};
use crate::packing::Packer;

/// Runs the configured command once per remote repository.
///
/// The child is killed if the request future is dropped (e.g. by the
/// request timeout layer).
#[derive(Debug, Clone)]
pub struct CommandPacker {
    config: PackerConfig,
}

impl CommandPacker {
    pub fn new(config: PackerConfig) -> Self {
        Self { config }
    }

    /// Command-line arguments for one remote pack.
    pub fn build_args(&self, url: &str, format: OutputFormat, options: &PackOptions) -> Vec<String> {
        let mut args = vec![
            "--remote".to_string(),
            url.to_string(),
            "--style".to_string(),
            format.as_str().to_string(),
            "--stdout".to_string(),
        ];

        let flags = [
            (options.remove_comments, "--remove-comments"),
            (options.remove_empty_lines, "--remove-empty-lines"),
            (options.show_line_numbers, "--output-show-line-numbers"),
            (options.output_parsable, "--parsable-style"),
            (options.compress, "--compress"),
            (options.file_summary == Some(false), "--no-file-summary"),
            (options.directory_structure == Some(false), "--no-directory-structure"),
        ];
        args.extend(flags.iter().filter(|(on, _)| *on).map(|(_, flag)| flag.to_string()));

        if let Some(include) = options.include_patterns.as_deref().filter(|p| !p.is_empty()) {
            args.push("--include".to_string());
            args.push(include.to_string());
        }
        if let Some(ignore) = options.ignore_patterns.as_deref().filter(|p| !p.is_empty()) {
            args.push("--ignore".to_string());
            args.push(ignore.to_string());
        }

        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl Packer for CommandPacker {
    async fn pack(
        &self,
        input: PackInput,
        format: OutputFormat,
        options: PackOptions,
        client_ip: &str,
    ) -> Result<PackResult, PackError> {
        let url = match input {
            PackInput::Remote { url } => url,
            PackInput::Archive(_) => {
                return Err(PackError::Validation(
                    "Archive uploads are not supported by this server".into(),
                ))
            }
        };

        tracing::debug!(url = %url, client_ip = %client_ip, format = %format, "Running packer");

        let output = Command::new(&self.config.command)
            .args(self.build_args(&url, format, &options))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PackError::Internal(format!("failed to run {}: {}", self.config.command, e)))?;

        if !output.status.success() {
            tracing::warn!(
                url = %url,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Packer exited with failure"
            );
            return Err(PackError::Upstream("Failed to process remote repository".into()));
        }

        let content = String::from_utf8(output.stdout)
            .map_err(|_| PackError::Processing("Packed output is not valid UTF-8".into()))?;
        let total_characters = content.chars().count() as u64;

        Ok(PackResult {
            content,
            format,
            metadata: PackMetadata {
                repository: url,
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                summary: Some(PackSummary {
                    total_files: None,
                    total_characters: Some(total_characters),
                    total_tokens: None,
                }),
            },
        })
    }
}
