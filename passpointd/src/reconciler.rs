// Passpoint start/stop reconciliation

//! Toggle protocol driving hostapd towards the desired Passpoint state
//!
//! hostapd only reads the Passpoint fragment when a VIF is (re)created. When
//! the desired state (Passpoint file) and the applied state (hostapd config)
//! disagree, the reconciler flips `Wifi_VIF_Config.enabled` to false and back
//! to true, waiting for `Wifi_VIF_State` to follow each time.
//!
//! Interfaces are processed one at a time. A failure on one interface is
//! recorded and the sweep moves on; the sweep fails if any interface failed.
//! Callers must not run two sweeps concurrently.

use crate::codec::{self, HS20, SINGLE_VALUE};
use crate::inventory::InterfaceLister;
use crate::state_store::{StateStore, ENABLED, IF_NAME, VIF_CONFIG_TABLE, VIF_STATE_TABLE};
use crate::types::{FileLayout, TogglePhase};
use crate::waiter::ConvergenceWaiter;
use std::fs;
use std::time::Duration;

/// Which way a sweep drives hostapd
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Apply Passpoint files that hostapd has not picked up yet
    Start,
    /// Drop Passpoint from hostapd where it is no longer desired
    Stop,
}

/// Why an interface was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Enabled state could not be read from the state table
    StateUnknown,
    /// VIF is not enabled
    VifDisabled,
    /// Start: Passpoint file does not ask for hs20=1
    NotDesired,
    /// Start: hostapd already runs with hs20=1
    AlreadyApplied,
    /// Stop: hostapd does not run with hs20=1
    AlreadyStopped,
    /// Stop: Passpoint file still asks for hs20=1
    StillDesired,
}

/// Result of reconciling one interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceOutcome {
    /// Interface the outcome belongs to
    pub if_name: String,
    /// Terminal phase: `NoActionNeeded`, `Done` or `Failed`
    pub phase: TogglePhase,
    /// Step that failed, when `phase` is `Failed`
    pub failed_step: Option<TogglePhase>,
    /// Why the interface was left alone, when `phase` is `NoActionNeeded`
    pub skipped: Option<SkipReason>,
}

/// Outcome of a whole sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Direction of the sweep
    pub kind: SweepKind,
    /// One entry per listed interface, in sweep order
    pub outcomes: Vec<InterfaceOutcome>,
    /// The managed interfaces could not be listed
    pub inventory_error: bool,
}

impl SweepReport {
    /// True unless the inventory was unreadable or some interface failed
    pub fn success(&self) -> bool {
        !self.inventory_error
            && self
                .outcomes
                .iter()
                .all(|o| o.phase != TogglePhase::Failed)
    }

    /// Interfaces whose toggle failed
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.interfaces_in(TogglePhase::Failed)
    }

    /// Interfaces that were toggled successfully
    pub fn toggled(&self) -> impl Iterator<Item = &str> {
        self.interfaces_in(TogglePhase::Done)
    }

    fn interfaces_in(&self, phase: TogglePhase) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(move |o| o.phase == phase)
            .map(|o| o.if_name.as_str())
    }
}

/// Runs start/stop sweeps over the managed interfaces
pub struct PasspointReconciler<'a, S, L> {
    layout: &'a FileLayout,
    store: &'a S,
    lister: &'a L,
    waiter: ConvergenceWaiter<'a, S>,
}

impl<'a, S: StateStore, L: InterfaceLister> PasspointReconciler<'a, S, L> {
    /// Reconciler over the interfaces `lister` yields, waiting at most
    /// `wait_timeout` for each VIF state change
    pub fn new(layout: &'a FileLayout, store: &'a S, lister: &'a L, wait_timeout: Duration) -> Self {
        Self {
            layout,
            store,
            lister,
            waiter: ConvergenceWaiter::new(store, wait_timeout),
        }
    }

    /// Bring up Passpoint on VIFs whose Passpoint file says hs20=1 but whose
    /// hostapd config does not yet.
    pub async fn start(&self) -> SweepReport {
        self.sweep(SweepKind::Start).await
    }

    /// Take Passpoint down on VIFs whose hostapd config still has hs20=1
    /// although the Passpoint file no longer asks for it. The Passpoint file
    /// is removed once the VIF came back up.
    pub async fn stop(&self) -> SweepReport {
        self.sweep(SweepKind::Stop).await
    }

    async fn sweep(&self, kind: SweepKind) -> SweepReport {
        log::info!("Passpoint {:?} sweep started", kind);

        let interfaces = match self.lister.interfaces() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                log::error!("Passpoint {:?} sweep aborted: {:#}", kind, e);
                return SweepReport {
                    kind,
                    outcomes: Vec::new(),
                    inventory_error: true,
                };
            }
        };

        let mut outcomes = Vec::with_capacity(interfaces.len());
        for if_name in interfaces {
            let outcome = self.reconcile(kind, &if_name).await;
            if outcome.phase == TogglePhase::Done && kind == SweepKind::Stop {
                self.remove_passpoint_file(&if_name);
            }
            outcomes.push(outcome);
        }

        let report = SweepReport {
            kind,
            outcomes,
            inventory_error: false,
        };
        log::info!(
            "Passpoint {:?} sweep finished: {} toggled, {} failed",
            kind,
            report.toggled().count(),
            report.failed().count()
        );
        report
    }

    /// Drive one interface through the toggle state machine
    async fn reconcile(&self, kind: SweepKind, if_name: &str) -> InterfaceOutcome {
        let mut phase = TogglePhase::Unknown;
        let mut failed_step = None;
        let mut skipped = None;

        while !phase.is_terminal() {
            let proceed = match phase {
                TogglePhase::Unknown => true,
                TogglePhase::Checking => match self.check(kind, if_name).await {
                    Ok(()) => true,
                    Err(reason) => {
                        log::debug!("Skipping {} ({:?})", if_name, reason);
                        skipped = Some(reason);
                        false
                    }
                },
                TogglePhase::ToggleDisable => self.set_enabled(if_name, false).await,
                TogglePhase::WaitDisabled => self.waiter.wait_enabled(if_name, false).await,
                TogglePhase::ToggleEnable => self.set_enabled(if_name, true).await,
                TogglePhase::WaitEnabled => self.waiter.wait_enabled(if_name, true).await,
                TogglePhase::NoActionNeeded | TogglePhase::Done | TogglePhase::Failed => break,
            };

            if !proceed && phase != TogglePhase::Checking {
                log::warn!(
                    "{:?} failed for interface {}, can't restart it",
                    phase,
                    if_name
                );
                failed_step = Some(phase);
            }
            phase = phase.advance(proceed);
        }

        if phase == TogglePhase::Done {
            log::info!("Interface {} restarted for Passpoint {:?}", if_name, kind);
        }

        InterfaceOutcome {
            if_name: if_name.to_string(),
            phase,
            failed_step,
            skipped,
        }
    }

    /// Decide whether `if_name` needs a toggle
    async fn check(&self, kind: SweepKind, if_name: &str) -> Result<(), SkipReason> {
        let enabled = self
            .store
            .get(VIF_STATE_TABLE, IF_NAME, if_name, ENABLED)
            .await
            .ok_or_else(|| {
                log::warn!("Cannot get enabled state of VIF {}", if_name);
                SkipReason::StateUnknown
            })?;
        if enabled != "true" {
            return Err(SkipReason::VifDisabled);
        }

        let desired = self.hs20_enabled(&self.layout.passpoint_file(if_name));
        let applied = self.hs20_enabled(&self.layout.daemon_file(if_name));

        match kind {
            SweepKind::Start if !desired => Err(SkipReason::NotDesired),
            SweepKind::Start if applied => {
                log::info!("Passpoint already started for interface {}", if_name);
                Err(SkipReason::AlreadyApplied)
            }
            SweepKind::Stop if !applied => {
                log::info!("Passpoint already stopped for interface {}", if_name);
                Err(SkipReason::AlreadyStopped)
            }
            SweepKind::Stop if desired => Err(SkipReason::StillDesired),
            _ => Ok(()),
        }
    }

    fn hs20_enabled(&self, path: &std::path::Path) -> bool {
        codec::read_value(path, HS20, SINGLE_VALUE).as_deref() == Some("1")
    }

    async fn set_enabled(&self, if_name: &str, enabled: bool) -> bool {
        self.store
            .set(
                VIF_CONFIG_TABLE,
                IF_NAME,
                if_name,
                ENABLED,
                if enabled { "true" } else { "false" },
            )
            .await
    }

    fn remove_passpoint_file(&self, if_name: &str) {
        let path = self.layout.passpoint_file(if_name);
        match fs::remove_file(&path) {
            Ok(()) => log::info!("Removed Passpoint config file {}", path.display()),
            Err(e) => log::warn!(
                "Failed to remove Passpoint config file {}: {}",
                path.display(),
                e
            ),
        }
    }
}
