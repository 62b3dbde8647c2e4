//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::nic::reconcile::DEFAULT_KERNEL_MODULES;

/// Root configuration for the agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// TLS listener settings.
    pub listener: ListenerConfig,

    /// Certificate material for the listener.
    pub tls: TlsConfig,

    /// Network interface reconciliation.
    pub nic: NicSettings,

    /// Loopback admin API.
    pub admin: AdminConfig,

    /// Log filter and format.
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Seconds a client gets to finish the TLS handshake.
    pub handshake_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            max_connections: 1024,
            handshake_timeout_secs: 10,
        }
    }
}

/// Certificate material for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    /// Directory holding `<name>.crt`, `<name>.key` and optionally `<name>.ca`.
    pub cert_dir: PathBuf,

    /// Base name of the identity files.
    pub name: String,

    /// Reload when files in `cert_dir` change.
    pub watch: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_dir: PathBuf::from("/var/lib/host-agent"),
            name: "agent".to_string(),
            watch: true,
        }
    }
}

/// Network interface reconciliation settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NicSettings {
    /// Directory of `<device>.json` files.
    pub config_dir: PathBuf,

    /// Modules loaded (best-effort) before each pass.
    pub kernel_modules: Vec<String>,

    /// Re-run reconciliation when `config_dir` changes.
    pub watch: bool,
}

impl Default for NicSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/run/host-agent/nics"),
            kernel_modules: DEFAULT_KERNEL_MODULES.iter().map(|m| m.to_string()).collect(),
            watch: true,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Loopback bind address of the admin API.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8444".to_string(),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub filter: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "host_agent=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
