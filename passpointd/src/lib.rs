// Passpoint Configuration Library
// Shared modules for daemon and tests

#![warn(missing_docs)]

//! Passpoint (Hotspot 2.0) Configuration Library
//!
//! This library generates the Passpoint configuration fragments hostapd
//! includes for each VIF, and makes the AP manager apply them by toggling the
//! VIF through the networking state database.
//!
//! # Main Components
//!
//! - [`codec`]: Passpoint file rendering and `key=value` lookups
//! - [`config`]: Configuration file parsing and validation
//! - [`inventory`]: Interfaces under Passpoint management
//! - [`passpoint`]: Configure/deconfigure entry points
//! - [`reconciler`]: Start/stop toggle sweeps
//! - [`service_state`]: Aggregate service state queries
//! - [`state_store`]: State database access via `ovsh`
//! - [`status_file`]: Status snapshot for external monitoring
//! - [`types`]: Shared data structures
//! - [`waiter`]: Bounded wait for VIF state convergence

pub mod codec;
pub mod config;
pub mod inventory;
pub mod passpoint;
pub mod reconciler;
pub mod service_state;
pub mod state_store;
pub mod status_file;
pub mod types;
pub mod waiter;
