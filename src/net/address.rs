//! Listener addresses.
//!
//! The transport is part of the address itself: `udp://host:port`,
//! `tcp://host:port` or `unix:///path/to/socket`.

use std::ffi::OsString;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

/// Error type for address parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid listen address {input:?}: {reason}")]
    Invalid { input: String, reason: String },

    #[error("unsupported scheme {scheme:?} in {input:?}: expected udp, tcp or unix")]
    UnsupportedScheme { input: String, scheme: String },
}

/// A resolved listen address. Exactly one transport per value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenAddr {
    Udp(SocketAddr),
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl ListenAddr {
    /// Parse and resolve an address URL.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let invalid = |reason: String| AddressError::Invalid {
            input: input.to_string(),
            reason,
        };

        let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "udp" => Ok(ListenAddr::Udp(resolve(&url).map_err(invalid)?)),
            "tcp" => Ok(ListenAddr::Tcp(resolve(&url).map_err(invalid)?)),
            "unix" => {
                let path = url.path();
                if url.host_str().is_some_and(|h| !h.is_empty()) || path.is_empty() || path == "/" {
                    return Err(invalid("unix addresses need an absolute path, e.g. unix:///run/intake.sock".into()));
                }
                // Percent-escapes decode to the bytes of the real file name.
                let decoded: Vec<u8> = percent_decode_str(path).collect();
                Ok(ListenAddr::Unix(PathBuf::from(OsString::from_vec(decoded))))
            }
            other => Err(AddressError::UnsupportedScheme {
                input: input.to_string(),
                scheme: other.to_string(),
            }),
        }
    }

    /// Network name as used in logs: `udp`, `tcp` or `unix`.
    pub fn network(&self) -> &'static str {
        match self {
            ListenAddr::Udp(_) => "udp",
            ListenAddr::Tcp(_) => "tcp",
            ListenAddr::Unix(_) => "unix",
        }
    }
}

fn resolve(url: &Url) -> Result<SocketAddr, String> {
    let host = url.host_str().ok_or_else(|| "missing host".to_string())?;
    let port = url.port().ok_or_else(|| "missing port".to_string())?;
    // Url keeps the brackets around IPv6 literals.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve {host}: {e}"))?
        .next()
        .ok_or_else(|| format!("{host} resolved to no addresses"))
}

impl FromStr for ListenAddr {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListenAddr::parse(s)
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Udp(addr) => write!(f, "udp://{}", addr),
            ListenAddr::Tcp(addr) => write!(f, "tcp://{}", addr),
            ListenAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
