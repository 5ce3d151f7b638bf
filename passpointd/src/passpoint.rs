// Passpoint target entry points

//! Passpoint configuration entry points
//!
//! [`Passpoint`] ties together the file layout, the state store and the
//! interface inventory, and exposes the operations the management plane
//! calls: writing Passpoint files, reading back applied values, running
//! start/stop sweeps and reporting the aggregate service state.

use crate::codec;
use crate::inventory::InterfaceLister;
use crate::reconciler::{PasspointReconciler, SweepReport};
use crate::service_state::ServiceStateQuery;
use crate::state_store::StateStore;
use crate::types::{FileLayout, PasspointRecord};
use anyhow::{Context, Result};
use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::time::Duration;

/// Permissions of the Passpoint directory. hostapd reads it as another user.
const PASSPOINT_DIR_MODE: u32 = 0o777;

/// Passpoint manager for all interfaces under one Passpoint directory
pub struct Passpoint<S, L> {
    layout: FileLayout,
    store: S,
    lister: L,
    wait_timeout: Duration,
}

impl<S: StateStore, L: InterfaceLister> Passpoint<S, L> {
    /// Manager over `layout`, waiting at most `wait_timeout` per VIF change
    pub fn new(layout: FileLayout, store: S, lister: L, wait_timeout: Duration) -> Self {
        Self {
            layout,
            store,
            lister,
            wait_timeout,
        }
    }

    /// Where Passpoint and hostapd files live
    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    /// Create the Passpoint directory if missing. Idempotent; call once at
    /// start-up.
    pub fn ensure_environment(&self) -> Result<()> {
        let dir = self.layout.passpoint_dir();
        if dir.is_dir() {
            return Ok(());
        }

        DirBuilder::new()
            .recursive(true)
            .mode(PASSPOINT_DIR_MODE)
            .create(dir)
            .with_context(|| format!("Failed to create Passpoint directory {}", dir.display()))?;
        log::info!("Created directory {} for Passpoint config", dir.display());
        Ok(())
    }

    /// Write the Passpoint file for `if_name` from `record`
    pub fn configure(&self, record: &PasspointRecord, if_name: &str, enable: bool) -> bool {
        let path = self.layout.passpoint_file(if_name);
        match fs::write(&path, codec::render(record, enable)) {
            Ok(()) => {
                log::info!(
                    "Passpoint config for {} written to {} (hs20={})",
                    if_name,
                    path.display(),
                    u8::from(enable)
                );
                true
            }
            Err(e) => {
                log::error!(
                    "Could not open {} for configuring Passpoint: {}",
                    path.display(),
                    e
                );
                false
            }
        }
    }

    /// Reduce the Passpoint file for `if_name` to `hs20=0`. The file is kept
    /// so that the next stop sweep sees the interface.
    pub fn deconfigure(&self, if_name: &str) -> bool {
        let path = self.layout.passpoint_file(if_name);
        match fs::write(&path, codec::render_disabled()) {
            Ok(()) => {
                log::info!("Passpoint disabled in {}", path.display());
                true
            }
            Err(e) => {
                log::error!(
                    "Could not open {} for deconfiguring Passpoint: {}",
                    path.display(),
                    e
                );
                false
            }
        }
    }

    /// Read `key` from the hostapd config of `if_name`. Roaming consortium
    /// entries are joined with ';'.
    pub fn get_configuration(&self, key: &str, if_name: &str) -> Option<String> {
        let value = codec::read_value(
            &self.layout.daemon_file(if_name),
            key,
            codec::multiplicity_for(key),
        );
        log::info!("{}: {} = {:?}", if_name, key, value);
        value
    }

    /// The Passpoint file of `if_name`, as hostapd would include it
    pub fn hostapd_fragment(&self, if_name: &str) -> Option<String> {
        let mut buf = String::new();
        codec::splice_into(&mut buf, &self.layout.passpoint_file(if_name)).then_some(buf)
    }

    /// Start/stop sweeps over the managed interfaces
    pub fn reconciler(&self) -> PasspointReconciler<'_, S, L> {
        PasspointReconciler::new(&self.layout, &self.store, &self.lister, self.wait_timeout)
    }

    /// Aggregate state queries over the managed interfaces
    pub fn service_state(&self) -> ServiceStateQuery<'_, S, L> {
        ServiceStateQuery::new(&self.layout, &self.store, &self.lister)
    }

    /// Run a start sweep
    pub async fn start(&self) -> SweepReport {
        self.reconciler().start().await
    }

    /// Run a stop sweep
    pub async fn stop(&self) -> SweepReport {
        self.reconciler().stop().await
    }

    /// Every managed interface wants Passpoint
    pub fn passpoint_desired_all(&self) -> bool {
        self.service_state().passpoint_desired_all()
    }

    /// Every managed interface runs Passpoint
    pub async fn passpoint_applied_all(&self) -> bool {
        self.service_state().passpoint_applied_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ROAMING_CONSORTIUM;
    use crate::inventory::DirectoryLister;
    use crate::state_store::fake::MemoryStore;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn passpoint(dir: &TempDir) -> Passpoint<MemoryStore, DirectoryLister> {
        let layout = FileLayout::new(dir.path().join("passpoint"), dir.path());
        let lister = DirectoryLister::new(layout.passpoint_dir());
        Passpoint::new(
            layout,
            MemoryStore::new(),
            lister,
            Duration::from_millis(5000),
        )
    }

    fn record() -> PasspointRecord {
        PasspointRecord {
            enable: Some(true),
            hessid: Some("11:22:33:44:55:66".to_string()),
            domain_name: Some("example.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_ensure_environment_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let passpoint = passpoint(&dir);
        let passpoint_dir = passpoint.layout().passpoint_dir().to_path_buf();
        assert!(!passpoint_dir.exists());

        passpoint.ensure_environment().unwrap();
        assert!(passpoint_dir.is_dir());

        // Idempotent
        passpoint.ensure_environment().unwrap();
        assert!(passpoint_dir.is_dir());
    }

    #[test]
    fn test_ensure_environment_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let passpoint = passpoint(&dir);
        passpoint.ensure_environment().unwrap();

        let mode = fs::metadata(passpoint.layout().passpoint_dir())
            .unwrap()
            .permissions()
            .mode();
        // umask may clear group/other write bits, never owner bits
        assert_eq!(mode & 0o700, 0o700);
    }

    #[test]
    fn test_configure_writes_rendered_file() {
        let dir = tempfile::tempdir().unwrap();
        let passpoint = passpoint(&dir);
        passpoint.ensure_environment().unwrap();

        assert!(passpoint.configure(&record(), "wl0", true));
        let content = fs::read_to_string(passpoint.layout().passpoint_file("wl0")).unwrap();
        assert_eq!(content, codec::render(&record(), true));

        // Overwritten wholesale
        assert!(passpoint.configure(&PasspointRecord::default(), "wl0", false));
        let content = fs::read_to_string(passpoint.layout().passpoint_file("wl0")).unwrap();
        assert!(content.starts_with("hs20=0\n"));
        assert!(!content.contains("hessid"));
    }

    #[test]
    fn test_configure_fails_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        let passpoint = passpoint(&dir);
        assert!(!passpoint.configure(&record(), "wl0", true));
        assert!(!passpoint.deconfigure("wl0"));
    }

    #[test]
    fn test_deconfigure_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let passpoint = passpoint(&dir);
        passpoint.ensure_environment().unwrap();
        assert!(passpoint.configure(&record(), "wl0", true));

        assert!(passpoint.deconfigure("wl0"));
        let content = fs::read_to_string(passpoint.layout().passpoint_file("wl0")).unwrap();
        assert_eq!(content, "hs20=0\n");
    }

    #[test]
    fn test_get_configuration_reads_hostapd_config() {
        let dir = tempfile::tempdir().unwrap();
        let passpoint = passpoint(&dir);
        passpoint.ensure_environment().unwrap();
        // Desired config differs from what hostapd runs with
        assert!(passpoint.configure(&record(), "wl0", true));
        let mut hostapd = String::from("interface=wl0\nhessid=aa:bb:cc:dd:ee:ff\n");
        for i in 0..10 {
            hostapd.push_str(&format!("roaming_consortium=oi{}\n", i));
        }
        hostapd.push_str("hessid=00:00:00:00:00:00\n");
        fs::write(passpoint.layout().daemon_file("wl0"), hostapd).unwrap();

        assert_eq!(
            passpoint.get_configuration("hessid", "wl0").as_deref(),
            Some("aa:bb:cc:dd:ee:ff")
        );
        assert_eq!(
            passpoint.get_configuration(ROAMING_CONSORTIUM, "wl0").as_deref(),
            Some("oi0;oi1;oi2;oi3;oi4;oi5;oi6;oi7")
        );
        assert_eq!(passpoint.get_configuration("domain_name", "wl0"), None);
        assert_eq!(passpoint.get_configuration("hessid", "wl1"), None);
    }

    #[test]
    fn test_hostapd_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let passpoint = passpoint(&dir);
        passpoint.ensure_environment().unwrap();
        assert_eq!(passpoint.hostapd_fragment("wl0"), None);

        assert!(passpoint.configure(&record(), "wl0", true));
        assert_eq!(
            passpoint.hostapd_fragment("wl0"),
            Some(codec::render(&record(), true))
        );
    }

    #[tokio::test]
    async fn test_configure_then_start_then_deconfigure_then_stop() {
        let dir = tempfile::tempdir().unwrap();
        let layout = FileLayout::new(dir.path().join("passpoint"), dir.path());
        let lister = DirectoryLister::new(layout.passpoint_dir());
        let passpoint = Passpoint::new(
            layout,
            MemoryStore::new().with_vif("wl0", true),
            lister,
            Duration::from_millis(5000),
        );
        passpoint.ensure_environment().unwrap();
        assert!(!passpoint.passpoint_desired_all());

        assert!(passpoint.configure(&record(), "wl0", true));
        assert!(passpoint.passpoint_desired_all());
        assert!(!passpoint.passpoint_applied_all().await);

        let report = passpoint.start().await;
        assert!(report.success());
        assert_eq!(report.toggled().collect::<Vec<_>>(), vec!["wl0"]);

        // The AP manager re-created the VIF with the Passpoint fragment
        let fragment = passpoint.hostapd_fragment("wl0").unwrap();
        fs::write(
            passpoint.layout().daemon_file("wl0"),
            format!("interface=wl0\n{}", fragment),
        )
        .unwrap();
        assert!(passpoint.passpoint_applied_all().await);
        assert_eq!(passpoint.start().await.toggled().count(), 0);

        assert!(passpoint.deconfigure("wl0"));
        assert!(!passpoint.passpoint_desired_all());
        let report = passpoint.stop().await;
        assert!(report.success());
        assert_eq!(report.toggled().collect::<Vec<_>>(), vec!["wl0"]);
        assert!(!passpoint.layout().passpoint_file("wl0").exists());
    }
}
