// Status file writer for external monitoring
//!
//! Writes the outcome of the latest sweep pair and the aggregate service state
//! to a file for consumption by monitoring scripts.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Snapshot written after every daemon sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Every managed interface wants Passpoint
    pub desired_all: bool,
    /// Every managed interface runs Passpoint
    pub applied_all: bool,
    /// Both the start and the stop sweep succeeded
    pub sweep_ok: bool,
}

impl Status {
    /// File content for this snapshot at `timestamp` (seconds since epoch)
    pub fn render(&self, timestamp: u64) -> String {
        format!(
            "DESIRED_ALL={}\nAPPLIED_ALL={}\nLAST_SWEEP={}\nTIMESTAMP={}\n",
            self.desired_all,
            self.applied_all,
            if self.sweep_ok { "ok" } else { "failed" },
            timestamp
        )
    }
}

/// Write current status to `path`
pub fn write_status(path: &Path, status: &Status) -> Result<()> {
    // Create directory if it doesn't exist
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).context("Failed to create status directory")?;
        }
    }

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    fs::write(path, status.render(timestamp)).context("Failed to write status file")?;

    Ok(())
}

/// Remove status file on shutdown
pub fn cleanup(path: &Path) {
    let _ = fs::remove_file(path);
}
