// OVSDB state store client

//! Access to the networking state database
//!
//! The database is only reachable through its command line tool (`ovsh`).
//! [`StateStore`] abstracts the three queries the reconciler needs so that the
//! toggle protocol can be exercised without spawning anything.

use anyhow::{Context, Result};
use tokio::process::Command;

/// Table mirroring the live state of each VIF
pub const VIF_STATE_TABLE: &str = "Wifi_VIF_State";
/// Table holding the administrative intent for each VIF
pub const VIF_CONFIG_TABLE: &str = "Wifi_VIF_Config";
/// Column identifying a VIF row
pub const IF_NAME: &str = "if_name";
/// Boolean column toggled to make the AP manager re-apply a VIF
pub const ENABLED: &str = "enabled";

/// First line printed by `ovsh u` when a row was updated
const UPDATE_OK_MARKER: &str = "1";
/// Prefix printed by `ovsh w` when the wait expired
const WAIT_TIMEOUT_MARKER: &str = "Error: timed out";

/// Query interface to the state store
///
/// None of the methods return errors: a failed query is logged and degrades to
/// "not found" / `false`, leaving the decision to the caller.
#[allow(async_fn_in_trait)]
pub trait StateStore {
    /// Read `field` from the first row of `table` where `key == value`
    async fn get(&self, table: &str, key: &str, value: &str, field: &str) -> Option<String>;

    /// Write `field := new_value` on rows of `table` where `key == value`
    async fn set(&self, table: &str, key: &str, value: &str, field: &str, new_value: &str)
        -> bool;

    /// Block until boolean `field` equals `expected`, at most `timeout_ms`
    async fn wait_for_field(
        &self,
        table: &str,
        key: &str,
        value: &str,
        field: &str,
        expected: bool,
        timeout_ms: u64,
    ) -> bool;
}

/// [`StateStore`] backed by the `ovsh` command line tool
pub struct OvshClient {
    tool: String,
}

impl OvshClient {
    /// Create a client running `tool` for every query
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Run the tool and return its stdout
    async fn run(&self, args: &[&str]) -> Result<String> {
        log::debug!("Running {} {}", self.tool, args.join(" "));

        let output = Command::new(&self.tool)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.tool))?;

        if !output.status.success() {
            log::debug!(
                "{} exited with {}: {}",
                self.tool,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Extract the value from `ovsh s ... -c <field>` output.
    ///
    /// Rows look like `enabled | true |`; the value is the third whitespace
    /// separated token of the first line that has one.
    #[doc(hidden)]
    pub fn parse_select_output(output: &str) -> Option<String> {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .find_map(|line| line.split_whitespace().nth(2))
            .map(str::to_string)
    }

    /// `ovsh u` prints the number of updated rows; exactly one is success
    #[doc(hidden)]
    pub fn parse_update_output(output: &str) -> bool {
        output
            .lines()
            .next()
            .map(|line| line.trim() == UPDATE_OK_MARKER)
            .unwrap_or(false)
    }

    /// `ovsh w` reports an expired wait on its first line
    #[doc(hidden)]
    pub fn parse_wait_output(output: &str) -> bool {
        !output
            .lines()
            .next()
            .map(|line| line.starts_with(WAIT_TIMEOUT_MARKER))
            .unwrap_or(false)
    }
}

impl StateStore for OvshClient {
    async fn get(&self, table: &str, key: &str, value: &str, field: &str) -> Option<String> {
        let filter = format!("{}=={}", key, value);
        let output = match self.run(&["s", table, "-w", &filter, "-c", field]).await {
            Ok(output) => output,
            Err(e) => {
                log::error!("{} get {} for {} failed: {:#}", table, field, filter, e);
                return None;
            }
        };

        let result = Self::parse_select_output(&output);
        match &result {
            Some(v) => log::debug!("{} get for {}: {}={}", table, filter, field, v),
            None => log::debug!("{} has no {} for {}", table, field, filter),
        }
        result
    }

    async fn set(
        &self,
        table: &str,
        key: &str,
        value: &str,
        field: &str,
        new_value: &str,
    ) -> bool {
        let filter = format!("{}=={}", key, value);
        let assignment = format!("{}:={}", field, new_value);
        let output = match self.run(&["u", table, "-w", &filter, &assignment]).await {
            Ok(output) => output,
            Err(e) => {
                log::error!("{} update {} for {} failed: {:#}", table, assignment, filter, e);
                return false;
            }
        };

        let updated = Self::parse_update_output(&output);
        if updated {
            log::info!("{} updated for {}: {}", table, filter, assignment);
        } else {
            log::debug!("{} update for {} returned {:?}", table, filter, output.trim());
        }
        updated
    }

    async fn wait_for_field(
        &self,
        table: &str,
        key: &str,
        value: &str,
        field: &str,
        expected: bool,
        timeout_ms: u64,
    ) -> bool {
        let filter = format!("{}=={}", key, value);
        // Waiting for false is expressed as "not true"
        let condition = format!("{}:=true", field);
        let timeout = timeout_ms.to_string();
        let mut args = vec!["w", table, "-w", filter.as_str()];
        if !expected {
            args.push("-n");
        }
        args.extend([condition.as_str(), "-t", timeout.as_str()]);

        let output = match self.run(&args).await {
            Ok(output) => output,
            Err(e) => {
                log::error!("{} wait for {} failed: {:#}", table, filter, e);
                return false;
            }
        };

        let converged = Self::parse_wait_output(&output);
        if !converged {
            log::info!(
                "Wait for {} to get {} = {} in {} timed out",
                value,
                field,
                expected,
                table
            );
        }
        converged
    }
}

/// In-memory [`StateStore`] used by the reconciler tests
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    /// Simulates the AP manager: writing `enabled` on a config row is mirrored
    /// into the matching state row unless the VIF is marked stuck.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        rows: RefCell<HashMap<(String, String), HashMap<String, String>>>,
        calls: RefCell<Vec<String>>,
        stuck: RefCell<HashSet<(String, String)>>,
        rejected_sets: RefCell<HashSet<(String, String)>>,
    }

    impl MemoryStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Seed both VIF tables with `enabled` for `if_name`
        pub(crate) fn with_vif(self, if_name: &str, enabled: bool) -> Self {
            for table in [VIF_STATE_TABLE, VIF_CONFIG_TABLE] {
                self.put(table, if_name, ENABLED, &enabled.to_string());
            }
            self
        }

        /// Never mirror `enabled := new_value` for `if_name`, so the matching
        /// wait times out
        pub(crate) fn stuck(self, if_name: &str, new_value: &str) -> Self {
            self.stuck
                .borrow_mut()
                .insert((if_name.to_string(), new_value.to_string()));
            self
        }

        /// Make `set(.., enabled, new_value)` fail for `if_name`
        pub(crate) fn reject_set(self, if_name: &str, new_value: &str) -> Self {
            self.rejected_sets
                .borrow_mut()
                .insert((if_name.to_string(), new_value.to_string()));
            self
        }

        pub(crate) fn put(&self, table: &str, if_name: &str, field: &str, value: &str) {
            self.rows
                .borrow_mut()
                .entry((table.to_string(), if_name.to_string()))
                .or_default()
                .insert(field.to_string(), value.to_string());
        }

        fn read(&self, table: &str, if_name: &str, field: &str) -> Option<String> {
            self.rows
                .borrow()
                .get(&(table.to_string(), if_name.to_string()))
                .and_then(|row| row.get(field).cloned())
        }

        /// Mutating calls in the order they were made
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl StateStore for MemoryStore {
        async fn get(&self, table: &str, key: &str, value: &str, field: &str) -> Option<String> {
            assert_eq!(key, IF_NAME);
            self.read(table, value, field)
        }

        async fn set(
            &self,
            table: &str,
            key: &str,
            value: &str,
            field: &str,
            new_value: &str,
        ) -> bool {
            assert_eq!(key, IF_NAME);
            self.calls
                .borrow_mut()
                .push(format!("set {} {} {}={}", table, value, field, new_value));

            if self
                .rejected_sets
                .borrow()
                .contains(&(value.to_string(), new_value.to_string()))
            {
                return false;
            }
            if self.read(table, value, field).is_none() {
                return false;
            }

            self.put(table, value, field, new_value);
            let stuck = self
                .stuck
                .borrow()
                .contains(&(value.to_string(), new_value.to_string()));
            if table == VIF_CONFIG_TABLE && !stuck {
                self.put(VIF_STATE_TABLE, value, field, new_value);
            }
            true
        }

        async fn wait_for_field(
            &self,
            table: &str,
            key: &str,
            value: &str,
            field: &str,
            expected: bool,
            _timeout_ms: u64,
        ) -> bool {
            assert_eq!(key, IF_NAME);
            self.calls
                .borrow_mut()
                .push(format!("wait {} {} {}={}", table, value, field, expected));

            let current = self.read(table, value, field).as_deref() == Some("true");
            current == expected
        }
    }
}
