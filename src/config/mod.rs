//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → handed to subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Environment variable *names* are configuration; their values are read
//!   by the observability environment detector

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CloudSinkConfig, EnvironmentConfig, LimitsConfig, ListenerConfig, LoggingConfig,
    ObservabilityConfig, PackerConfig, ServerConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
