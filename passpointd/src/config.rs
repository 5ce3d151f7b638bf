// Configuration file parser

//! Configuration file parsing and validation
//!
//! This module handles loading the daemon's TOML configuration and the
//! Passpoint records supplied by the management plane.

use crate::types::{Config, PasspointRecord};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

    let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

    validate_config(&config)?;
    Ok(config)
}

/// Load a Passpoint record from TOML file
pub fn load_record<P: AsRef<Path>>(path: P) -> Result<PasspointRecord> {
    let contents =
        fs::read_to_string(path.as_ref()).context("Failed to read Passpoint record")?;

    toml::from_str(&contents).context("Failed to parse Passpoint record")
}

/// Validate configuration values
fn validate_config(config: &Config) -> Result<()> {
    if config.general.passpoint_dir.as_os_str().is_empty() {
        anyhow::bail!("passpoint_dir cannot be empty");
    }

    if config.general.runtime_dir.as_os_str().is_empty() {
        anyhow::bail!("runtime_dir cannot be empty");
    }

    if config.general.wait_timeout_ms == 0 {
        anyhow::bail!("wait_timeout_ms must be > 0");
    }

    if config.general.sweep_interval == 0 {
        anyhow::bail!("sweep_interval must be > 0");
    }

    if config.store.tool.trim().is_empty() {
        anyhow::bail!("store.tool cannot be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(
            config.general.passpoint_dir,
            PathBuf::from("/var/run/passpoint")
        );
        assert_eq!(config.general.runtime_dir, PathBuf::from("/var/run"));
        assert_eq!(config.general.wait_timeout_ms, 5000);
        assert_eq!(config.general.sweep_interval, 30);
        assert_eq!(config.general.log_level, "info");
        assert!(config.general.status_file.is_none());
        assert_eq!(config.store.tool, "ovsh");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());

        // Zero wait timeout
        let mut bad_config = config.clone();
        bad_config.general.wait_timeout_ms = 0;
        assert!(validate_config(&bad_config).is_err());

        // Zero sweep interval
        let mut bad_config = config.clone();
        bad_config.general.sweep_interval = 0;
        assert!(validate_config(&bad_config).is_err());

        // Empty directory
        let mut bad_config = config.clone();
        bad_config.general.passpoint_dir = PathBuf::new();
        assert!(validate_config(&bad_config).is_err());

        let mut bad_config = config.clone();
        bad_config.general.runtime_dir = PathBuf::new();
        assert!(validate_config(&bad_config).is_err());

        // Blank tool
        let mut bad_config = config.clone();
        bad_config.store.tool = "  ".to_string();
        assert!(validate_config(&bad_config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[general]
passpoint_dir = "/tmp/passpoint"
wait_timeout_ms = 2500
status_file = "/tmp/passpointd.state"

[store]
tool = "/usr/opensync/tools/ovsh"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.general.passpoint_dir, PathBuf::from("/tmp/passpoint"));
        assert_eq!(config.general.runtime_dir, PathBuf::from("/var/run"));
        assert_eq!(config.general.wait_timeout_ms, 2500);
        assert_eq!(
            config.general.status_file,
            Some(PathBuf::from("/tmp/passpointd.state"))
        );
        assert_eq!(config.store.tool, "/usr/opensync/tools/ovsh");
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nwait_timeout_ms = 0").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/passpointd.toml").is_err());
    }

    #[test]
    fn test_load_record() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
enable = true
domain_name = "example.com"
nai_realm_list = ["example.com", "example.net"]
list_3gpp = ["310:410"]

[other_config]
venue = "stadium"
"#
        )
        .unwrap();

        let record = load_record(file.path()).unwrap();
        assert_eq!(record.enable, Some(true));
        assert_eq!(record.domain_name.as_deref(), Some("example.com"));
        assert_eq!(record.nai_realm_list, vec!["example.com", "example.net"]);
        assert_eq!(record.list_3gpp, vec!["310:410"]);
        assert_eq!(
            record.other_config.get("venue").map(String::as_str),
            Some("stadium")
        );
    }

    #[test]
    fn test_load_record_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "roaming_consortium = \"not-a-list\"").unwrap();
        assert!(load_record(file.path()).is_err());
    }
}
