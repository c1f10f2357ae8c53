// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::MacFormat;

/// Ethernet MTU bound used to cap `max_payload` (spec §4.7): `ETHER_MAX_LEN`
/// minus the 8-byte PPPoE discovery/session header.
pub const ETHER_MAX_LEN: u16 = 1518;
/// RFC 4638's floor for `max_payload` when non-zero.
pub const PPPOE_MRU: u16 = 1492;
/// Default PPPoE MTU/MRU reported when no max-payload negotiation applies.
pub const PPPOE_DEFAULT_MTU: u16 = 1492;
/// One-shot connect timer duration (spec §3, §4.4).
pub const PPPOE_CONNECT_TIMEOUT_SECS: u64 = 9;
/// Default parent-interface table capacity (spec §4.2).
pub const PPPOE_MAXPARENTIFS: usize = 4096;
/// Capacity used when built for constrained systems (spec §4.2).
pub const PPPOE_MAXPARENTIFS_SMALL: usize = 32;

/// Per-link static configuration — the fields `ConfigSurface` (spec §4.7)
/// mutates, plus a field it reads but never writes (`parent_hook`'s
/// default).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Parent Ethernet interface name (`set iface`).
    #[serde(rename = "Iface")]
    pub iface: String,

    /// Hook on the Ethernet node PPPoE attaches to. Defaults to `orphans`.
    #[serde(rename = "ParentHook", default = "default_parent_hook")]
    pub parent_hook: String,

    /// Requested service name; `*` or empty means "any" (`set service`).
    #[serde(rename = "Service", default)]
    pub service: String,

    /// Advertised AC name when offering incoming sessions (`set acname`).
    #[serde(rename = "AcName", default)]
    pub ac_name: String,

    /// RFC 4638 PPP-Max-Payload; `0` disables the negotiation
    /// (`set max-payload`).
    #[serde(rename = "MaxPayload", default)]
    pub max_payload: u16,

    /// Rendering used for calling/called-number reporting
    /// (`set mac-format`).
    #[serde(rename = "MacFormat", default)]
    pub mac_format: MacFormat,

    /// Whether this link accepts incoming sessions (mirrors the host's
    /// `LINK_CONF_INCOMING` option so the dispatcher's scan and the config
    /// surface agree on the same value).
    #[serde(rename = "AcceptIncoming", default)]
    pub accept_incoming: bool,
}

fn default_parent_hook() -> String {
    "orphans".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            iface: String::new(),
            parent_hook: default_parent_hook(),
            service: String::new(),
            ac_name: String::new(),
            max_payload: 0,
            mac_format: MacFormat::default(),
            accept_incoming: false,
        }
    }
}

impl LinkConfig {
    /// Validates a candidate `max_payload` per spec §4.7:
    /// `0` (disabled) or `PPPOE_MRU..=ETHER_MAX_LEN-8`.
    pub fn validate_max_payload(value: u16) -> Result<()> {
        if value == 0 {
            return Ok(());
        }
        let upper = ETHER_MAX_LEN - 8;
        ensure!(
            (PPPOE_MRU..=upper).contains(&value),
            "max-payload must be 0 or in {PPPOE_MRU}..={upper}, got {value}"
        );
        Ok(())
    }
}

/// Implementation/runtime parameters that live outside the PPPoE wire
/// protocol: registry sizing and process identity used to form session hook
/// names.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Capacity of the `ParentIfRegistry` (spec §4.2). Defaults to the
    /// "not small system" profile.
    #[serde(rename = "MaxParentIfs", default = "default_max_parent_ifs")]
    pub max_parent_ifs: usize,

    /// Overrides the process id used to form `mpd<pid>-<link_id>` hook
    /// names; primarily useful for deterministic tests.
    #[serde(rename = "Pid", default)]
    pub pid: Option<u32>,
}

fn default_max_parent_ifs() -> usize {
    PPPOE_MAXPARENTIFS
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parent_ifs: default_max_parent_ifs(),
            pid: None,
        }
    }
}

/// Top-level configuration for the PPPoE subsystem: one `LinkConfig` per
/// configured link plus the shared `RuntimeConfig`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub links: Vec<LinkConfig>,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates invariants across all configured links.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.runtime.max_parent_ifs >= 1, "MaxParentIfs must be >= 1");
        for link in &self.links {
            ensure!(!link.iface.is_empty(), "Iface must not be empty");
            LinkConfig::validate_max_payload(link.max_payload)
                .with_context(|| format!("link {:?}", link.iface))?;
        }
        Ok(())
    }
}

/// Derives the graph path of a parent Ethernet attachment from its
/// interface name, per spec §3: replace `.` and `:` with `_`, then append
/// `:`.
pub fn derive_parent_path(iface: &str) -> String {
    let mut path: String = iface
        .chars()
        .map(|c| if c == '.' || c == ':' { '_' } else { c })
        .collect();
    path.push(':');
    path
}
