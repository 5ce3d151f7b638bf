//! Aggregate Passpoint service state over all managed interfaces

use crate::codec::{self, HS20, SINGLE_VALUE};
use crate::inventory::InterfaceLister;
use crate::state_store::{StateStore, ENABLED, IF_NAME, VIF_STATE_TABLE};
use crate::types::FileLayout;

/// Read-only queries over the Passpoint and hostapd files
pub struct ServiceStateQuery<'a, S, L> {
    layout: &'a FileLayout,
    store: &'a S,
    lister: &'a L,
}

impl<'a, S: StateStore, L: InterfaceLister> ServiceStateQuery<'a, S, L> {
    /// Queries over the interfaces `lister` yields
    pub fn new(layout: &'a FileLayout, store: &'a S, lister: &'a L) -> Self {
        Self {
            layout,
            store,
            lister,
        }
    }

    fn interfaces(&self) -> Vec<String> {
        self.lister.interfaces().unwrap_or_else(|e| {
            log::warn!("{:#}", e);
            Vec::new()
        })
    }

    /// True if every managed interface has a Passpoint file with hs20=1.
    /// An empty inventory is false.
    pub fn passpoint_desired_all(&self) -> bool {
        let mut all = false;
        for if_name in self.interfaces() {
            let hs20 = codec::read_value(&self.layout.passpoint_file(&if_name), HS20, SINGLE_VALUE);
            log::debug!("Interface {} desired hs20={:?}", if_name, hs20);
            if hs20.as_deref() != Some("1") {
                return false;
            }
            all = true;
        }
        all
    }

    /// True if every managed VIF is enabled and runs hostapd with hs20=1.
    /// An empty inventory is false.
    pub async fn passpoint_applied_all(&self) -> bool {
        let mut all = false;
        for if_name in self.interfaces() {
            let enabled = self
                .store
                .get(VIF_STATE_TABLE, IF_NAME, &if_name, ENABLED)
                .await;
            if enabled.as_deref() != Some("true") {
                log::debug!("Interface {} not enabled ({:?})", if_name, enabled);
                return false;
            }

            let hs20 = codec::read_value(&self.layout.daemon_file(&if_name), HS20, SINGLE_VALUE);
            log::debug!("Interface {} applied hs20={:?}", if_name, hs20);
            if hs20.as_deref() != Some("1") {
                return false;
            }
            all = true;
        }
        all
    }
}
