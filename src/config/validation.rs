//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every listen address parses and suits its intake
//! - Validate value ranges (readers ≥ 1, lengths > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: IntakeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::IntakeConfig;
use crate::net::address::{AddressError, ListenAddr};

/// A single semantic problem in a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },

    #[error("{field}: {source}")]
    Address {
        field: &'static str,
        source: AddressError,
    },

    #[error("{field}: {addr} is a {network} address, expected {expected}")]
    WrongNetwork {
        field: &'static str,
        addr: String,
        network: &'static str,
        expected: &'static str,
    },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &IntakeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let listeners = &config.listeners;

    for (field, value) in [
        ("listeners.num_readers", listeners.num_readers),
        ("listeners.metric_max_length", listeners.metric_max_length),
        ("listeners.trace_max_length", listeners.trace_max_length),
    ] {
        if value < 1 {
            errors.push(ValidationError::TooSmall { field, min: 1, value });
        }
    }

    check_addresses(
        &mut errors,
        "listeners.statsd_addresses",
        &listeners.statsd_addresses,
        "udp or tcp",
        |addr| !matches!(addr, ListenAddr::Unix(_)),
    );
    check_addresses(
        &mut errors,
        "listeners.ssf_addresses",
        &listeners.ssf_addresses,
        "udp or unix",
        |addr| !matches!(addr, ListenAddr::Tcp(_)),
    );

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addresses(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    addresses: &[String],
    expected: &'static str,
    accepts: impl Fn(&ListenAddr) -> bool,
) {
    for input in addresses {
        match ListenAddr::parse(input) {
            Ok(addr) if accepts(&addr) => {}
            Ok(addr) => errors.push(ValidationError::WrongNetwork {
                field,
                addr: input.clone(),
                network: addr.network(),
                expected,
            }),
            Err(source) => errors.push(ValidationError::Address { field, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&IntakeConfig::default()), Ok(()));
    }

    #[test]
    fn statsd_rejects_unix() {
        let mut config = IntakeConfig::default();
        config.listeners.statsd_addresses = vec!["unix:///tmp/statsd.sock".to_string()];

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::WrongNetwork { network: "unix", .. }]
        ));
    }

    #[test]
    fn ssf_rejects_tcp() {
        let mut config = IntakeConfig::default();
        config.listeners.ssf_addresses = vec!["tcp://127.0.0.1:8128".to_string()];

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::WrongNetwork { network: "tcp", .. }]
        ));
    }

    #[test]
    fn reports_every_error() {
        let mut config = IntakeConfig::default();
        config.listeners.num_readers = 0;
        config.listeners.trace_max_length = 0;
        config.listeners.ssf_addresses = vec!["carrier-pigeon://loft".to_string()];
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "not an address".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Address { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MetricsAddress(_))));
    }
}
