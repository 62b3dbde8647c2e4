//! Declarative per-interface configuration files.
//!
//! One JSON document per interface, named `<device>.json`:
//!
//! ```json
//! {"deviceName": "eth0", "nicName": "wan0", "mtu": 1400, "macAddress": "aa:bb:cc:dd:ee:ff"}
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::nic::link::normalize_hw_addr;

/// Desired state of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NicConfig {
    /// Name the orchestrator knows the device by. Informational only.
    #[serde(alias = "device_name")]
    pub device_name: String,

    /// Target interface name; empty leaves the name unchanged.
    #[serde(alias = "nic_name")]
    pub nic_name: String,

    /// Target MTU; zero leaves the MTU unchanged.
    pub mtu: u32,

    /// Matching key. Entries without one are never applied.
    #[serde(alias = "mac_address")]
    pub mac_address: String,
}

impl NicConfig {
    /// Normalized matching key, or `None` when this entry is inert.
    pub fn match_key(&self) -> Option<String> {
        normalize_hw_addr(&self.mac_address)
    }

    /// Target name, if it differs from `current`.
    pub fn rename_to(&self, current: &str) -> Option<&str> {
        (!self.nic_name.is_empty() && self.nic_name != current).then_some(self.nic_name.as_str())
    }

    /// Target MTU, if it differs from `current`.
    pub fn mtu_to(&self, current: u32) -> Option<u32> {
        (self.mtu > 0 && self.mtu != current).then_some(self.mtu)
    }
}

/// Errors that abort a whole reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum NicConfigError {
    #[error("could not read network interface configuration directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse network interface configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// List the configuration files in `dir`, in lexical name order.
///
/// Returns `Ok(None)` when the directory does not exist.
pub fn list_nic_config_files(dir: &Path) -> Result<Option<Vec<PathBuf>>, NicConfigError> {
    let read_dir_err = |source| NicConfigError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(read_dir_err(e)),
    };

    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_dir_err)?;
    paths.sort();
    Ok(Some(paths))
}

/// Parse `paths` in order, keyed by normalized MAC address.
///
/// With duplicate MAC addresses the last file wins. A file that cannot be
/// read is logged and skipped, while a file that cannot be parsed fails the
/// whole load.
pub fn parse_nic_configs(paths: &[PathBuf]) -> Result<HashMap<String, NicConfig>, NicConfigError> {
    let mut configs = HashMap::with_capacity(paths.len());
    for path in paths {
        // TODO: decide with the orchestrator side whether unreadable files
        // should abort the pass like unparseable ones do.
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Could not read network interface configuration file");
                continue;
            }
        };

        let config: NicConfig = serde_json::from_slice(&bytes)
            .map_err(|source| NicConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        if let Some(mac) = config.match_key() {
            if let Some(previous) = configs.insert(mac.clone(), config) {
                tracing::warn!(
                    mac = %mac,
                    path = %path.display(),
                    replaced_device = %previous.device_name,
                    "Duplicate MAC address in network interface configuration"
                );
            }
        } else {
            tracing::debug!(path = %path.display(), "Ignoring network interface configuration without MAC address");
        }
    }

    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(dir: &Path) -> Result<Option<HashMap<String, NicConfig>>, NicConfigError> {
        match list_nic_config_files(dir)? {
            Some(paths) => parse_nic_configs(&paths).map(Some),
            None => Ok(None),
        }
    }

    #[test]
    fn parses_camel_case_and_snake_case_keys() {
        let camel: NicConfig =
            serde_json::from_str(r#"{"deviceName":"eth0","nicName":"wan0","mtu":1400,"macAddress":"AA:BB:CC:DD:EE:FF"}"#)
                .unwrap();
        let snake: NicConfig =
            serde_json::from_str(r#"{"device_name":"eth0","nic_name":"wan0","mtu":1400,"mac_address":"AA:BB:CC:DD:EE:FF"}"#)
                .unwrap();

        assert_eq!(camel, snake);
        assert_eq!(camel.match_key().as_deref(), Some("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn absent_fields_mean_unchanged() {
        let config: NicConfig = serde_json::from_str(r#"{"macAddress":"aa:bb:cc:dd:ee:ff"}"#).unwrap();

        assert_eq!(config.rename_to("eth0"), None);
        assert_eq!(config.mtu_to(1500), None);
    }

    #[test]
    fn differences_are_detected() {
        let config = NicConfig {
            nic_name: "wan0".into(),
            mtu: 1400,
            mac_address: "aa:bb:cc:dd:ee:ff".into(),
            ..Default::default()
        };

        assert_eq!(config.rename_to("eth0"), Some("wan0"));
        assert_eq!(config.rename_to("wan0"), None);
        assert_eq!(config.mtu_to(1500), Some(1400));
        assert_eq!(config.mtu_to(1400), None);
    }

    #[test]
    fn missing_directory_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();

        let loaded = load(&root.path().join("nics")).unwrap();

        assert!(loaded.is_none());
    }

    #[test]
    fn entries_without_mac_are_not_indexed() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("eth0.json"), r#"{"nicName":"wan0","mtu":9000}"#).unwrap();
        fs::write(root.path().join("eth1.json"), r#"{"nicName":"lan0","macAddress":"  "}"#).unwrap();

        let loaded = load(root.path()).unwrap().unwrap();

        assert!(loaded.is_empty());
    }

    #[test]
    fn duplicate_mac_resolves_to_last_file_name() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("b.json"), r#"{"nicName":"second","macAddress":"aa:bb:cc:dd:ee:ff"}"#).unwrap();
        fs::write(root.path().join("a.json"), r#"{"nicName":"first","macAddress":"AA:BB:CC:DD:EE:FF"}"#).unwrap();

        let loaded = load(root.path()).unwrap().unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["aa:bb:cc:dd:ee:ff"].nic_name, "second");
    }

    #[test]
    fn malformed_file_fails_the_load() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("a.json"), r#"{"nicName":"wan0","macAddress":"aa:bb:cc:dd:ee:ff"}"#).unwrap();
        fs::write(root.path().join("b.json"), "{not json").unwrap();

        let err = load(root.path()).unwrap_err();

        assert!(matches!(err, NicConfigError::Parse { .. }));
    }

    #[test]
    fn unreadable_entry_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        // Reading a directory as a file fails, which exercises the skip path.
        fs::create_dir(root.path().join("a.json")).unwrap();
        fs::write(root.path().join("b.json"), r#"{"nicName":"wan0","macAddress":"aa:bb:cc:dd:ee:ff"}"#).unwrap();

        let loaded = load(root.path()).unwrap().unwrap();

        assert_eq!(loaded.len(), 1);
    }
}
