//! Inventory of interfaces under Passpoint management
//!
//! The authoritative list is the set of entries in the Passpoint config
//! directory: one file per interface, named after it.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Source of the interface names to reconcile
pub trait InterfaceLister {
    /// Interface names, in a stable order
    fn interfaces(&self) -> Result<Vec<String>>;
}

/// Fixed set of interfaces
impl InterfaceLister for Vec<String> {
    fn interfaces(&self) -> Result<Vec<String>> {
        Ok(self.clone())
    }
}

/// Lists the entries of the Passpoint config directory
pub struct DirectoryLister {
    dir: PathBuf,
}

impl DirectoryLister {
    /// Lister over the entries of `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl InterfaceLister for DirectoryLister {
    fn interfaces(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).with_context(|| {
            format!(
                "Unable to open Passpoint configuration directory {}",
                self.dir.display()
            )
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Covers "." and ".." as well as editor leftovers
            if name.starts_with('.') {
                log::debug!("Skipping entry '{}'", name);
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names)
    }
}

/// Validates that an interface name is safe to use as a file name and as a
/// query argument. Only alphanumerics, '-', '_' and '.' are allowed, and the
/// name may not start with '.'.
pub fn validate_interface_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("Interface name cannot be empty");
    }

    if name.starts_with('.') {
        anyhow::bail!("Interface name cannot start with '.': '{}'", name);
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        anyhow::bail!(
            "Interface name contains invalid characters: '{}'. Only alphanumeric, '-', '_' and '.' are allowed",
            name
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_lister() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["wl1.2", "wl0.1", ".wl0.1.swp"] {
            fs::write(dir.path().join(name), "hs20=1\n").unwrap();
        }

        let lister = DirectoryLister::new(dir.path());
        assert_eq!(lister.interfaces().unwrap(), vec!["wl0.1", "wl1.2"]);
    }

    #[test]
    fn test_directory_lister_empty() {
        let dir = tempfile::tempdir().unwrap();
        let lister = DirectoryLister::new(dir.path());
        assert!(lister.interfaces().unwrap().is_empty());
    }

    #[test]
    fn test_directory_lister_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let lister = DirectoryLister::new(dir.path().join("missing"));
        assert!(lister.interfaces().is_err());
    }

    #[test]
    fn test_fixed_lister() {
        let lister = vec!["wl0".to_string(), "wl1".to_string()];
        assert_eq!(lister.interfaces().unwrap(), vec!["wl0", "wl1"]);
    }

    #[test]
    fn test_validate_interface_name_valid() {
        assert!(validate_interface_name("wl0").is_ok());
        assert!(validate_interface_name("wl0.1").is_ok());
        assert!(validate_interface_name("home-ap-24").is_ok());
        assert!(validate_interface_name("b_ap_50").is_ok());
    }

    #[test]
    fn test_validate_interface_name_invalid() {
        assert!(validate_interface_name("").is_err());
        assert!(validate_interface_name(".").is_err());
        assert!(validate_interface_name("..").is_err());
        assert!(validate_interface_name("../etc/passwd").is_err());
        assert!(validate_interface_name("wl0/1").is_err());
        assert!(validate_interface_name("wl0 wl1").is_err());
        assert!(validate_interface_name("wl0;reboot").is_err());
        assert!(validate_interface_name("$(whoami)").is_err());
    }
}
