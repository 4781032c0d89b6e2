//! Configuration file loading for the emulator binary.
//!
//! Shaped after `core-config`: a serde `ConfigFile` with per-field defaults,
//! `discover()` checking a local file before the platform config directory,
//! and `load_from` that falls back to defaults on any read or parse error
//! rather than failing the process.

use anyhow::Result;
use pc4_engine::EngineConfig;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConfigFile {
    pub status_reporting_interval_ms: u64,
    pub print_start_delay_ms: u64,
    pub validation_delay_ms: u64,
    pub busy_state_change_delay_ms: u64,
    pub tof_state_change_delay_ms: u64,
    pub paper_in_chute_set_delay_ms: u64,
    pub paper_in_chute_clear_delay_ms: u64,
    pub reassembly_timeout_ms: u64,
    pub min_message_size: usize,
    pub max_message_size: usize,
    pub unit_address: char,
    pub software_version: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let defaults = EngineConfig::default();
        Self {
            status_reporting_interval_ms: defaults.status_reporting_interval.as_millis() as u64,
            print_start_delay_ms: defaults.print_start_delay.as_millis() as u64,
            validation_delay_ms: defaults.validation_delay.as_millis() as u64,
            busy_state_change_delay_ms: defaults.busy_state_change_delay.as_millis() as u64,
            tof_state_change_delay_ms: defaults.tof_state_change_delay.as_millis() as u64,
            paper_in_chute_set_delay_ms: defaults.paper_in_chute_set_delay.as_millis() as u64,
            paper_in_chute_clear_delay_ms: defaults.paper_in_chute_clear_delay.as_millis() as u64,
            reassembly_timeout_ms: defaults.reassembly_timeout.as_millis() as u64,
            min_message_size: defaults.min_message_size,
            max_message_size: defaults.max_message_size,
            unit_address: defaults.unit_address as char,
            software_version: defaults.software_version,
        }
    }
}

impl ConfigFile {
    pub fn into_engine_config(self) -> EngineConfig {
        EngineConfig {
            status_reporting_interval: std::time::Duration::from_millis(
                self.status_reporting_interval_ms,
            ),
            print_start_delay: std::time::Duration::from_millis(self.print_start_delay_ms),
            validation_delay: std::time::Duration::from_millis(self.validation_delay_ms),
            busy_state_change_delay: std::time::Duration::from_millis(
                self.busy_state_change_delay_ms,
            ),
            tof_state_change_delay: std::time::Duration::from_millis(
                self.tof_state_change_delay_ms,
            ),
            paper_in_chute_set_delay: std::time::Duration::from_millis(
                self.paper_in_chute_set_delay_ms,
            ),
            paper_in_chute_clear_delay: std::time::Duration::from_millis(
                self.paper_in_chute_clear_delay_ms,
            ),
            reassembly_timeout: std::time::Duration::from_millis(self.reassembly_timeout_ms),
            min_message_size: self.min_message_size,
            max_message_size: self.max_message_size,
            unit_address: self.unit_address as u8,
            software_version: self.software_version,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,
    pub file: ConfigFile,
}

impl Config {
    pub fn into_engine_config(self) -> EngineConfig {
        self.file.into_engine_config()
    }
}

/// Best-effort config path: a local `pc4d.toml` takes precedence, otherwise
/// the platform config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("pc4d.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("pc4d").join("pc4d.toml");
    }
    PathBuf::from("pc4d.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
            }),
            Err(err) => {
                warn!(target: "config", path = %path.display(), %err, "config parse failed, using defaults");
                Ok(Config::default())
            }
        },
        Err(_) => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_engine_defaults() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_pc4d__.toml"))).unwrap();
        let engine_cfg = cfg.into_engine_config();
        assert_eq!(engine_cfg.unit_address, b'0');
        assert_eq!(engine_cfg.software_version, "PAY-6.22B");
        assert_eq!(engine_cfg.print_start_delay.as_millis(), 3000);
        assert_eq!(engine_cfg.validation_delay.as_millis(), 18000);
        assert_eq!(engine_cfg.busy_state_change_delay.as_millis(), 20000);
        assert_eq!(engine_cfg.tof_state_change_delay.as_millis(), 4000);
        assert_eq!(engine_cfg.reassembly_timeout.as_millis(), 20);
        assert_eq!(engine_cfg.min_message_size, 4);
        assert_eq!(engine_cfg.max_message_size, 1024);
    }

    #[test]
    fn parses_overridden_delays() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "status_reporting_interval_ms = 500\nunit_address = \"1\"\nsoftware_version = \"PAY-7.00\"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.status_reporting_interval_ms, 500);
        let engine_cfg = cfg.into_engine_config();
        assert_eq!(engine_cfg.unit_address, b'1');
        assert_eq!(engine_cfg.software_version, "PAY-7.00");
        // Unspecified fields keep their defaults.
        assert_eq!(engine_cfg.print_start_delay.as_millis(), 3000);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "not valid toml :::").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.unit_address, '0');
    }
}
