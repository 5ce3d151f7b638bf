//! Bounded wait for a VIF to report its enabled state
//!
//! The AP manager applies `Wifi_VIF_Config` changes asynchronously and
//! mirrors the result into `Wifi_VIF_State`. The waiter blocks on the state
//! table with a fixed timeout so a VIF that never converges cannot stall a
//! sweep.

use crate::state_store::{StateStore, ENABLED, IF_NAME, VIF_STATE_TABLE};
use std::time::Duration;

/// Waits for `Wifi_VIF_State.enabled` transitions
pub struct ConvergenceWaiter<'a, S> {
    store: &'a S,
    timeout: Duration,
}

impl<'a, S: StateStore> ConvergenceWaiter<'a, S> {
    /// Create a waiter giving up after `timeout`
    pub fn new(store: &'a S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Wait for `if_name` to report `enabled == expected`.
    /// Returns false on timeout.
    pub async fn wait_enabled(&self, if_name: &str, expected: bool) -> bool {
        log::debug!(
            "Waiting up to {:?} for {} to report enabled={}",
            self.timeout,
            if_name,
            expected
        );

        let converged = self
            .store
            .wait_for_field(
                VIF_STATE_TABLE,
                IF_NAME,
                if_name,
                ENABLED,
                expected,
                self.timeout_ms(),
            )
            .await;

        if !converged {
            log::warn!(
                "{} did not report enabled={} within {:?}",
                if_name,
                expected,
                self.timeout
            );
        }
        converged
    }

    /// Timeout handed to the store, in milliseconds
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
