//! TLS configuration and certificate loading.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{self, RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

/// Error type for TLS setup.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid client CA: {0}")]
    ClientCa(String),

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Observed security of a stream listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    Unencrypted,
    Encrypted,
    /// Mutual TLS: clients must present a certificate we verify.
    Authenticated,
}

impl SecurityMode {
    pub fn for_tls(tls: Option<&TlsSettings>) -> Self {
        match tls {
            None => SecurityMode::Unencrypted,
            Some(t) if t.requires_client_cert() => SecurityMode::Authenticated,
            Some(_) => SecurityMode::Encrypted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::Unencrypted => "unencrypted",
            SecurityMode::Encrypted => "encrypted",
            SecurityMode::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side TLS configuration.
#[derive(Clone)]
pub struct TlsSettings {
    config: Arc<ServerConfig>,
    requires_client_cert: bool,
}

impl TlsSettings {
    /// Wrap a prepared rustls config.
    pub fn new(config: Arc<ServerConfig>, requires_client_cert: bool) -> Self {
        Self {
            config,
            requires_client_cert,
        }
    }

    /// Load a certificate chain and key; with `client_ca` every client must
    /// present a certificate signed by it.
    pub fn from_files(cert_path: &Path, key_path: &Path, client_ca: Option<&Path>) -> Result<Self, TlsError> {
        let certs = load_certs(cert_path)?;
        let key = load_key(key_path)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder =
            ServerConfig::builder_with_provider(Arc::clone(&provider)).with_safe_default_protocol_versions()?;
        let config = match client_ca {
            Some(ca_path) => {
                let mut roots = RootCertStore::empty();
                for cert in load_certs(ca_path)? {
                    roots.add(cert)?;
                }
                let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                    .build()
                    .map_err(|e| TlsError::ClientCa(e.to_string()))?;
                builder.with_client_cert_verifier(verifier).with_single_cert(certs, key)?
            }
            None => builder.with_no_client_auth().with_single_cert(certs, key)?,
        };

        tracing::debug!(
            cert = %cert_path.display(),
            client_auth = client_ca.is_some(),
            "TLS configuration loaded"
        );
        Ok(Self::new(Arc::new(config), client_ca.is_some()))
    }

    pub fn requires_client_cert(&self) -> bool {
        self.requires_client_cert
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(Arc::clone(&self.config))
    }
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("requires_client_cert", &self.requires_client_cert)
            .finish_non_exhaustive()
    }
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}
