//! Configuration for the `plc-server` binary: bind address plus the
//! heartbeat parameters handed to the `Controller` embedders construct
//! against this process's `Memory`.
//!
//! Loaded from an optional YAML file, overridable by environment variables,
//! using `serde_yaml` plus `anyhow::Context` to name which step ("reading"
//! vs "parsing") failed and on which path.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

fn default_bind_addr() -> String {
    "127.0.0.1:7737".to_string()
}

fn default_heartbeat_interval_ms() -> Option<u64> {
    None
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// `None` disables heartbeat-based connection liveness entirely.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: Option<u64>,

    /// `None` means any modification counts as a heartbeat.
    #[serde(default)]
    pub heartbeat_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_key: None,
        }
    }
}

impl ServerConfig {
    /// Reads and parses a YAML config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Starts from `default()` (or a config file, if `PLC_CONFIG_FILE` is
    /// set), then applies any of `PLC_BIND_ADDR` / `PLC_HEARTBEAT_INTERVAL_MS`
    /// / `PLC_HEARTBEAT_KEY` found in the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("PLC_CONFIG_FILE") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var("PLC_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(ms) = std::env::var("PLC_HEARTBEAT_INTERVAL_MS") {
            config.heartbeat_interval_ms = Some(
                ms.parse()
                    .with_context(|| format!("parsing PLC_HEARTBEAT_INTERVAL_MS={ms}"))?,
            );
        }
        if let Ok(key) = std::env::var("PLC_HEARTBEAT_KEY") {
            config.heartbeat_key = Some(key);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_locally_with_heartbeat_disabled() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:7737");
        assert!(config.heartbeat_interval_ms.is_none());
    }

    #[test]
    fn from_file_parses_partial_yaml_with_defaults_filled_in() {
        let dir = std::env::temp_dir();
        let path = dir.join("plc_server_test_config.yaml");
        std::fs::write(&path, "bind_addr: \"0.0.0.0:9999\"\n").unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9999");
        assert!(config.heartbeat_interval_ms.is_none());

        std::fs::remove_file(&path).ok();
    }
}
