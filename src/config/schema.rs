//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the pack server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Structured logging and sink selection.
    pub logging: LoggingConfig,

    /// Diagnostics and metrics settings.
    pub observability: ObservabilityConfig,

    /// Packing collaborator settings.
    pub packer: PackerConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum accepted body size for the pack endpoint, in bytes.
    pub max_request_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Structured logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Names of the environment variables that drive sink selection.
    pub environment: EnvironmentConfig,

    /// Managed cloud sink settings.
    pub cloud: CloudSinkConfig,
}

/// Environment variable names consulted by the environment detector.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Cloud project identifier variables, first non-empty wins.
    pub project_vars: Vec<String>,

    /// Managed service marker variables.
    pub service_vars: Vec<String>,

    /// Path to explicit service credentials.
    pub credentials_var: String,

    /// Execution mode variable.
    pub mode_var: String,

    /// Value of `mode_var` that means production.
    pub production_value: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            project_vars: vec![
                "GOOGLE_CLOUD_PROJECT".to_string(),
                "GCLOUD_PROJECT".to_string(),
                "GCP_PROJECT".to_string(),
            ],
            service_vars: vec!["K_SERVICE".to_string(), "GAE_SERVICE".to_string()],
            credentials_var: "GOOGLE_APPLICATION_CREDENTIALS".to_string(),
            mode_var: "NODE_ENV".to_string(),
            production_value: "production".to_string(),
        }
    }
}

/// Managed cloud log sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloudSinkConfig {
    /// Allow the cloud sink when the environment supports it.
    pub enabled: bool,

    /// Log name under the project (`projects/<id>/logs/<log_name>`).
    pub log_name: String,

    /// `entries:write` endpoint.
    pub endpoint: String,

    /// Instance metadata token endpoint, used when no credentials file is set.
    pub token_url: String,

    /// Records buffered before new ones are dropped.
    pub queue_capacity: usize,

    /// Entries per write request.
    pub batch_size: usize,

    /// Maximum time a partial batch waits, in milliseconds.
    pub flush_interval_ms: u64,

    /// Timeout for a single write request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for CloudSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_name: "pack-server".to_string(),
            endpoint: "https://logging.googleapis.com/v2/entries:write".to_string(),
            token_url:
                "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token"
                    .to_string(),
            queue_capacity: 1024,
            batch_size: 50,
            flush_interval_ms: 1000,
            request_timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error). Unset: info in production, debug otherwise.
    pub log_level: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// External packing command configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PackerConfig {
    /// Executable invoked for remote repositories.
    pub command: String,

    /// Extra arguments appended to every invocation.
    pub extra_args: Vec<String>,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            command: "repomix".to_string(),
            extra_args: Vec::new(),
        }
    }
}
