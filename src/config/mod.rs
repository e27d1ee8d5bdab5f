//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → IntakeConfig (validated, immutable)
//!     → IntakeServer::from_config
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; changing listeners requires a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{IntakeConfig, ListenersConfig, ObservabilityConfig, TlsConfig};
pub use validation::{validate_config, ValidationError};
