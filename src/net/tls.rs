//! Server TLS configuration from certificate material on disk.
//!
//! Looks for `<name>.crt`, `<name>.key` and an optional `<name>.ca` in one
//! directory. With a CA bundle present, client certificates are requested and
//! verified against it without being required; callers authorize above TLS.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

/// Errors that can occur while building a server TLS configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no certificate found in {0}")]
    NoCertificate(PathBuf),
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),
    #[error("invalid CA certificate: {0}")]
    InvalidCa(String),
    #[error("failed to build client verifier: {0}")]
    Verifier(String),
    #[error("failed to build TLS config: {0}")]
    Config(#[from] rustls::Error),
}

/// Paths of the key pair and CA bundle for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

impl CertPaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            cert: dir.join(format!("{name}.crt")),
            key: dir.join(format!("{name}.key")),
            ca: dir.join(format!("{name}.ca")),
        }
    }
}

/// Build the server configuration for identity `name` in `dir`.
pub fn server_tls_config(dir: &Path, name: &str) -> Result<Arc<ServerConfig>, TlsError> {
    let paths = CertPaths::new(dir, name);

    let certs = load_certs(&paths.cert)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(paths.cert));
    }
    let key = load_key(&paths.key)?;

    let ca = if paths.ca.exists() {
        Some(load_certs(&paths.ca)?)
    } else {
        None
    };

    build_server_config(certs, key, ca)
}

/// Assemble a server configuration from already-parsed material.
pub fn build_server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    ca: Option<Vec<CertificateDer<'static>>>,
) -> Result<Arc<ServerConfig>, TlsError> {
    let provider = Arc::new(ring::default_provider());
    let builder = ServerConfig::builder_with_provider(provider.clone()).with_safe_default_protocol_versions()?;

    let mut config = match ca {
        Some(ca) => {
            let mut roots = RootCertStore::empty();
            for cert in ca {
                roots.add(cert).map_err(|e| TlsError::InvalidCa(e.to_string()))?;
            }

            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .allow_unauthenticated()
                .build()
                .map_err(|e| TlsError::Verifier(e.to_string()))?;

            builder.with_client_cert_verifier(verifier).with_single_cert(certs, key)?
        }
        None => builder.with_no_client_auth().with_single_cert(certs, key)?,
    };

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_identity(dir: &Path, name: &str) -> String {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let pem = cert.cert.pem();
        std::fs::write(dir.join(format!("{name}.crt")), &pem).unwrap();
        std::fs::write(dir.join(format!("{name}.key")), cert.key_pair.serialize_pem()).unwrap();
        pem
    }

    #[test]
    fn builds_server_only_config() {
        let dir = tempfile::tempdir().unwrap();
        write_identity(dir.path(), "agent");

        let config = server_tls_config(dir.path(), "agent").unwrap();

        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn builds_config_with_client_ca() {
        let dir = tempfile::tempdir().unwrap();
        write_identity(dir.path(), "agent");
        let ca = rcgen::generate_simple_self_signed(vec!["client-ca".to_string()]).unwrap();
        std::fs::write(dir.path().join("agent.ca"), ca.cert.pem()).unwrap();

        assert!(server_tls_config(dir.path(), "agent").is_ok());
    }

    #[test]
    fn missing_key_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        write_identity(dir.path(), "agent");
        std::fs::remove_file(dir.path().join("agent.key")).unwrap();

        assert!(matches!(server_tls_config(dir.path(), "agent"), Err(TlsError::Read { .. })));
    }

    #[test]
    fn empty_certificate_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_identity(dir.path(), "agent");
        std::fs::write(dir.path().join("agent.crt"), "").unwrap();

        assert!(matches!(server_tls_config(dir.path(), "agent"), Err(TlsError::NoCertificate(_))));
    }

    #[test]
    fn key_file_without_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pem = write_identity(dir.path(), "agent");
        std::fs::write(dir.path().join("agent.key"), pem).unwrap();

        assert!(matches!(server_tls_config(dir.path(), "agent"), Err(TlsError::NoPrivateKey(_))));
    }
}
