//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::IntakeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<IntakeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<IntakeConfig, ConfigError> {
    let config: IntakeConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_loads_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.listeners.num_readers, 1);
        assert!(config.tls.is_none());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
hostname = "intake-1"

[listeners]
statsd_addresses = ["udp://127.0.0.1:8126", "tcp://127.0.0.1:8126"]
ssf_addresses = ["unix:///tmp/ssf.sock"]
num_readers = 4
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.hostname, "intake-1");
        assert_eq!(config.listeners.num_readers, 4);
        assert_eq!(config.listeners.statsd_addresses.len(), 2);
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        assert!(matches!(parse_config("[listeners"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn semantic_errors_are_collected() {
        let err = parse_config(
            r#"
[listeners]
num_readers = 0
statsd_addresses = ["unix:///tmp/statsd.sock"]
"#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
