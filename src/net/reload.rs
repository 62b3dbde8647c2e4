//! Rebuild the listener's TLS configuration from disk.

use std::path::PathBuf;
use std::sync::Arc;

use crate::net::listener::HotSwapTlsListener;
use crate::net::tls::{server_tls_config, TlsError};

/// Reloads certificate material into a [`HotSwapTlsListener`].
///
/// If the rebuild fails the previous configuration stays installed.
#[derive(Debug, Clone)]
pub struct TlsReloader {
    listener: Arc<HotSwapTlsListener>,
    cert_dir: PathBuf,
    name: String,
}

impl TlsReloader {
    pub fn new(listener: Arc<HotSwapTlsListener>, cert_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            listener,
            cert_dir: cert_dir.into(),
            name: name.into(),
        }
    }

    /// Read the certificate material again and swap it in.
    pub fn reload(&self) -> Result<(), TlsError> {
        match server_tls_config(&self.cert_dir, &self.name) {
            Ok(config) => {
                self.listener.set_config(config);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    cert_dir = %self.cert_dir.display(),
                    error = %e,
                    "TLS reload failed, keeping current configuration"
                );
                Err(e)
            }
        }
    }
}
