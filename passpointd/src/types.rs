// Shared types for the Passpoint daemon

//! Shared data structures
//!
//! This module defines the daemon configuration, the Passpoint record handed
//! down by the management plane, the on-disk file layout and the per-interface
//! toggle states used by the reconciler.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Desired Passpoint configuration for one interface, as produced by the
/// management plane. Every field is optional; absent fields are not rendered.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PasspointRecord {
    /// Administrative enable flag
    #[serde(default)]
    pub enable: Option<bool>,
    /// WAN link status (B0-B1 of the WAN metrics info byte)
    #[serde(default)]
    pub adv_wan_status: Option<u8>,
    /// WAN link symmetric flag
    #[serde(default)]
    pub adv_wan_symmetric: Option<bool>,
    /// WAN link at-capacity flag
    #[serde(default)]
    pub adv_wan_at_capacity: Option<bool>,
    /// Homogeneous ESS identifier
    #[serde(default)]
    pub hessid: Option<String>,
    /// Domain name advertised over ANQP
    #[serde(default)]
    pub domain_name: Option<String>,
    /// NAI realms, rendered as RFC 4282 formatted
    #[serde(default)]
    pub nai_realm_list: Vec<String>,
    /// 3GPP cellular networks as "MCC:MNC" entries
    #[serde(default)]
    pub list_3gpp: Vec<String>,
    /// Roaming consortium OIs; only the first 8 are rendered
    #[serde(default)]
    pub roaming_consortium: Vec<String>,
    /// Extension map. Not rendered: hostapd has no agreed format for it yet.
    #[serde(default)]
    pub other_config: BTreeMap<String, String>,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Paths, timing and logging
    #[serde(default)]
    pub general: GeneralConfig,
    /// State store access
    #[serde(default)]
    pub store: StoreConfig,
}

/// General configuration options
#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// Directory holding one Passpoint file per managed interface
    #[serde(default = "default_passpoint_dir")]
    pub passpoint_dir: PathBuf,
    /// Directory holding the hostapd-<ifname>.config files
    #[serde(default = "default_runtime_dir")]
    pub runtime_dir: PathBuf,
    /// Upper bound for each VIF state wait, in milliseconds
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Seconds between sweeps in daemon mode
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Status snapshot written after each daemon sweep
    #[serde(default)]
    pub status_file: Option<PathBuf>,
}

/// State store (OVSDB) access options
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Query/update tool to execute
    #[serde(default = "default_tool")]
    pub tool: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            passpoint_dir: default_passpoint_dir(),
            runtime_dir: default_runtime_dir(),
            wait_timeout_ms: default_wait_timeout_ms(),
            sweep_interval: default_sweep_interval(),
            log_level: default_log_level(),
            status_file: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
        }
    }
}

// Default values for configuration
fn default_passpoint_dir() -> PathBuf {
    PathBuf::from("/var/run/passpoint")
}

fn default_runtime_dir() -> PathBuf {
    PathBuf::from("/var/run")
}

fn default_wait_timeout_ms() -> u64 {
    5000
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tool() -> String {
    "ovsh".to_string()
}

/// Where the per-interface files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    passpoint_dir: PathBuf,
    runtime_dir: PathBuf,
}

impl FileLayout {
    /// Create a layout from the two configured directories
    pub fn new(passpoint_dir: impl Into<PathBuf>, runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            passpoint_dir: passpoint_dir.into(),
            runtime_dir: runtime_dir.into(),
        }
    }

    /// Directory whose entries are the managed interfaces
    pub fn passpoint_dir(&self) -> &Path {
        &self.passpoint_dir
    }

    /// Passpoint file written by this daemon for `if_name`
    pub fn passpoint_file(&self, if_name: &str) -> PathBuf {
        self.passpoint_dir.join(if_name)
    }

    /// hostapd config written by the AP manager for `if_name`
    pub fn daemon_file(&self, if_name: &str) -> PathBuf {
        self.runtime_dir.join(format!("hostapd-{}.config", if_name))
    }
}

impl From<&GeneralConfig> for FileLayout {
    fn from(general: &GeneralConfig) -> Self {
        Self::new(&general.passpoint_dir, &general.runtime_dir)
    }
}

/// Per-interface toggle states driven by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TogglePhase {
    /// Not looked at yet
    Unknown,
    /// Comparing desired and applied state
    Checking,
    /// Interface skipped
    NoActionNeeded,
    /// Writing enabled=false
    ToggleDisable,
    /// Waiting for the VIF to report disabled
    WaitDisabled,
    /// Writing enabled=true
    ToggleEnable,
    /// Waiting for the VIF to report enabled
    WaitEnabled,
    /// Toggle completed
    Done,
    /// A toggle step failed
    Failed,
}

impl TogglePhase {
    /// Next phase once the current one has run. `proceed` is the outcome of
    /// the current step: for `Checking` it means "action needed", for the
    /// toggle steps it means the step succeeded.
    pub fn advance(self, proceed: bool) -> TogglePhase {
        match (self, proceed) {
            (TogglePhase::Unknown, _) => TogglePhase::Checking,
            (TogglePhase::Checking, true) => TogglePhase::ToggleDisable,
            (TogglePhase::Checking, false) => TogglePhase::NoActionNeeded,
            (TogglePhase::ToggleDisable, true) => TogglePhase::WaitDisabled,
            (TogglePhase::WaitDisabled, true) => TogglePhase::ToggleEnable,
            (TogglePhase::ToggleEnable, true) => TogglePhase::WaitEnabled,
            (TogglePhase::WaitEnabled, true) => TogglePhase::Done,
            (
                TogglePhase::ToggleDisable
                | TogglePhase::WaitDisabled
                | TogglePhase::ToggleEnable
                | TogglePhase::WaitEnabled,
                false,
            ) => TogglePhase::Failed,
            (terminal, _) => terminal,
        }
    }

    /// True once no further step will run
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TogglePhase::NoActionNeeded | TogglePhase::Done | TogglePhase::Failed
        )
    }
}
