//! Runtime environment detection.
//!
//! # Responsibilities
//! - Snapshot the environment variables that decide sink selection
//! - Report whether the managed cloud log sink is usable
//!
//! # Design Decisions
//! - Absence of every signal means "not available" (console only)
//! - Empty variables are treated as unset
//! - Variable names come from configuration, not constants

use std::path::PathBuf;

use crate::config::EnvironmentConfig;

/// Snapshot of the environment signals relevant to logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Cloud project identifier, if any project variable is set.
    pub project_id: Option<String>,
    /// Managed service name (e.g. a serverless revision), if running in one.
    pub service: Option<String>,
    /// Path to explicit service credentials.
    pub credentials_path: Option<PathBuf>,
    /// Raw execution mode value.
    pub mode: Option<String>,
    production_value: String,
}

impl Environment {
    /// Read the process environment.
    pub fn detect(config: &EnvironmentConfig) -> Self {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Build a snapshot from an arbitrary variable lookup.
    pub fn from_lookup<F>(config: &EnvironmentConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let first_of = |names: &[String]| names.iter().find_map(|n| read(n));

        Self {
            project_id: first_of(&config.project_vars),
            service: first_of(&config.service_vars),
            credentials_path: read(&config.credentials_var).map(PathBuf::from),
            mode: read(&config.mode_var),
            production_value: config.production_value.clone(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.mode.as_deref() == Some(self.production_value.as_str())
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials_path.is_some()
    }

    /// Project and service marker together identify a managed runtime.
    pub fn is_managed_runtime(&self) -> bool {
        self.project_id.is_some() && self.service.is_some()
    }

    /// True only for production processes with credentials or a managed runtime.
    pub fn is_managed_logging_available(&self) -> bool {
        self.is_production() && (self.has_credentials() || self.is_managed_runtime())
    }
}

/// Re-reads the process environment on every call.
pub fn is_managed_logging_available(config: &EnvironmentConfig) -> bool {
    Environment::detect(config).is_managed_logging_available()
}
