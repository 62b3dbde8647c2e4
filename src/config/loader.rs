//! Configuration loading from disk.
//!
//! Keys the schema does not know are reported as warnings and otherwise
//! ignored; syntax and type errors still fail the load.

use std::fs;
use std::io;
use std::path::Path;

use crate::config::schema::AgentConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load configuration, falling back to defaults when the file is absent.
pub fn load_config_or_default(path: &Path) -> Result<AgentConfig, ConfigError> {
    match load_config(path) {
        Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Configuration file not found, using defaults");
            Ok(AgentConfig::default())
        }
        other => other,
    }
}

/// Parse configuration text, warning about unknown keys.
pub fn parse_config(content: &str) -> Result<AgentConfig, ConfigError> {
    let table: toml::Table = content.parse()?;

    for key in unknown_keys(&table) {
        tracing::warn!(key = %key, "Invalid configuration key: unknown key, ignoring");
    }

    let config = toml::Value::Table(table).try_into()?;
    Ok(config)
}

/// Dotted paths of every key in `table` that the schema does not define.
pub fn unknown_keys(table: &toml::Table) -> Vec<String> {
    let known = match toml::Value::try_from(AgentConfig::default()) {
        Ok(toml::Value::Table(known)) => known,
        Ok(_) => return Vec::new(),
        Err(e) => {
            tracing::debug!(error = %e, "Could not derive known configuration keys");
            return Vec::new();
        }
    };

    let mut unknown = Vec::new();
    collect_unknown(table, &known, "", &mut unknown);
    unknown
}

fn collect_unknown(table: &toml::Table, known: &toml::Table, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match (value, known.get(key)) {
            (_, None) => out.push(path),
            (toml::Value::Table(inner), Some(toml::Value::Table(known_inner))) => {
                collect_unknown(inner, known_inner, &path, out);
            }
            _ => {}
        }
    }
}
