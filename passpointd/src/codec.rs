// Passpoint config file codec

//! Passpoint config file rendering and lookup
//!
//! Renders a [`PasspointRecord`] into the `key=value` lines hostapd expects,
//! and reads values back from either the Passpoint file or the hostapd config
//! file. Only single-line `key=value` lookups are supported.

use crate::types::PasspointRecord;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// hs20 enable flag
pub const HS20: &str = "hs20";
/// WAN metrics, info byte followed by zeroed link figures
pub const HS20_WAN_METRICS: &str = "hs20_wan_metrics";
/// Homogeneous ESS identifier
pub const HESSID: &str = "hessid";
/// Domain name list
pub const DOMAIN_NAME: &str = "domain_name";
/// 3GPP cellular network list
pub const ANQP_3GPP_CELL_NET: &str = "anqp_3gpp_cell_net";
/// NAI realm list
pub const NAI_REALM: &str = "nai_realm";
/// Roaming consortium OI, one line per entry
pub const ROAMING_CONSORTIUM: &str = "roaming_consortium";

// Not part of the record, but mandatory for hostapd to enable Passpoint
const INTERWORKING: &str = "interworking";
const INTERNET: &str = "internet";
const DISABLE_DGAF: &str = "disable_dgaf";
const ACCESS_NETWORK_TYPE: &str = "access_network_type";

/// Access network type 15: wildcard
const ACCESS_NETWORK_TYPE_WILDCARD: u8 = 15;

/// Separator used when joining multi-valued keys
pub const VALUE_SEPARATOR: &str = ";";

/// Multiplicity of ordinary keys
pub const SINGLE_VALUE: usize = 1;

/// Upper bound on roaming consortium entries (schema limit)
pub const ROAMING_CONSORTIUM_MAX: usize = 8;

/// Multiplicity used when reading `key` back from a config file
pub fn multiplicity_for(key: &str) -> usize {
    if key == ROAMING_CONSORTIUM {
        ROAMING_CONSORTIUM_MAX
    } else {
        SINGLE_VALUE
    }
}

fn push_line(out: &mut String, key: &str, value: impl std::fmt::Display) {
    // Writing into a String cannot fail
    let _ = writeln!(out, "{}={}", key, value);
    log::debug!("Set {}={}", key, value);
}

/// Pack the WAN metrics info byte: status in the low bits, symmetric shifted
/// by 2, at-capacity shifted by 3. Status is not masked.
pub fn wan_info_byte(status: u8, symmetric: bool, at_capacity: bool) -> u8 {
    (u8::from(at_capacity) << 3) | (u8::from(symmetric) << 2) | status
}

/// Render `record` as the content of a Passpoint config file
pub fn render(record: &PasspointRecord, enable: bool) -> String {
    let mut out = String::with_capacity(512);

    push_line(&mut out, HS20, u8::from(enable));

    if let (Some(status), Some(symmetric), Some(at_capacity)) = (
        record.adv_wan_status,
        record.adv_wan_symmetric,
        record.adv_wan_at_capacity,
    ) {
        let info = wan_info_byte(status, symmetric, at_capacity);
        push_line(
            &mut out,
            HS20_WAN_METRICS,
            format_args!("{:02x}:0:0:0:0:0", info),
        );
    }

    if let Some(hessid) = &record.hessid {
        push_line(&mut out, HESSID, hessid);
    }

    if let Some(domain_name) = &record.domain_name {
        push_line(&mut out, DOMAIN_NAME, domain_name);
    }

    // "MCC:MNC" entries become "MCC,MNC", joined with ';'
    let cell_nets = record
        .list_3gpp
        .iter()
        .map(|entry| {
            entry
                .split(':')
                .filter(|token| !token.is_empty())
                .collect::<Vec<_>>()
                .join(",")
        })
        .filter(|entry| !entry.is_empty())
        .collect::<Vec<_>>();
    if !cell_nets.is_empty() {
        push_line(&mut out, ANQP_3GPP_CELL_NET, cell_nets.join(VALUE_SEPARATOR));
    }

    // Leading 0: realm formatted in accordance with IETF RFC 4282
    let realms = non_empty(&record.nai_realm_list);
    if !realms.is_empty() {
        push_line(
            &mut out,
            NAI_REALM,
            format_args!("0,{}", realms.join(VALUE_SEPARATOR)),
        );
    }

    // Cap applies to input positions, holes included
    let consortium = &record.roaming_consortium;
    let consortium = &consortium[..consortium.len().min(ROAMING_CONSORTIUM_MAX)];
    for oi in non_empty(consortium) {
        push_line(&mut out, ROAMING_CONSORTIUM, oi);
    }

    // record.other_config has no hostapd mapping yet and is not rendered

    push_line(&mut out, INTERWORKING, 1);
    push_line(&mut out, INTERNET, 1);
    push_line(&mut out, DISABLE_DGAF, 1);
    push_line(&mut out, ACCESS_NETWORK_TYPE, ACCESS_NETWORK_TYPE_WILDCARD);

    out
}

/// Content written on deconfigure
pub fn render_disabled() -> String {
    format!("{}=0\n", HS20)
}

fn non_empty(entries: &[String]) -> Vec<&str> {
    entries
        .iter()
        .map(String::as_str)
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Values of `key` in `data`, in file order
fn values<'a>(data: &'a str, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    data.lines().filter_map(move |line| {
        let line = line.trim();
        if line.starts_with('#') {
            return None;
        }
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim())
    })
}

/// Look up `key` in already loaded config data.
///
/// With `max_count == 1` the first occurrence wins. With a larger
/// `max_count` up to that many occurrences are joined with `;`.
pub fn lookup(data: &str, key: &str, max_count: usize) -> Option<String> {
    if max_count <= SINGLE_VALUE {
        return values(data, key).next().map(str::to_string);
    }

    let found = values(data, key).take(max_count).collect::<Vec<_>>();
    if found.is_empty() {
        return None;
    }

    let joined = found.join(VALUE_SEPARATOR);
    log::debug!("For param {} found {} value(s): {}", key, found.len(), joined);
    (!joined.is_empty()).then_some(joined)
}

/// Read `key` from the config file at `path`. A missing or unreadable file
/// yields `None`.
pub fn read_value(path: &Path, key: &str, max_count: usize) -> Option<String> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("File {} not found", path.display());
            return None;
        }
        Err(e) => {
            log::warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    let value = lookup(&data, key, max_count);
    match &value {
        Some(v) => log::debug!("{}: {}={}", path.display(), key, v),
        None => log::debug!("{}: {} not found", path.display(), key),
    }
    value
}

/// Append the Passpoint file at `path` to a hostapd config buffer.
/// Returns false if the file cannot be read.
pub fn splice_into(buf: &mut String, path: &Path) -> bool {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            log::error!(
                "Passpoint config file {} not readable: {}",
                path.display(),
                e
            );
            return false;
        }
    };

    for line in data.lines() {
        buf.push_str(line);
        buf.push('\n');
    }
    true
}
