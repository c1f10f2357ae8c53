// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::cfg::{
    config::LinkConfig,
    enums::MacFormat,
};

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// `set` subcommand surface for a link's `ConfigSurface` (spec §6). Mirrors
/// the host daemon's `set pppoe ...` command line, one variant per setter.
#[derive(Debug, Parser)]
#[command(name = "set pppoe", about = "Configure a PPPoE link")]
pub struct SetPppoeCli {
    #[command(subcommand)]
    pub command: SetPppoeCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum SetPppoeCommand {
    /// `set iface <name> [hook]` — parent Ethernet interface, and
    /// optionally the hook to attach on (defaults to `orphans`).
    Iface {
        name: String,
        hook: Option<String>,
    },
    /// `set service <name>` — requested service name, or empty for "any".
    Service { name: String },
    /// `set acname <name>` — advertised AC name for incoming sessions.
    Acname { name: String },
    /// `set max-payload <n>` — RFC 4638 PPP-Max-Payload, or `0` to
    /// disable.
    MaxPayload { value: u16 },
    /// `set mac-format <fmt>` — rendering for calling/called number
    /// reporting.
    MacFormat { value: MacFormat },
}

/// Applies one `SetPppoeCommand` to a `LinkConfig` in place, validating the
/// candidate value first. No partial mutation happens on validation
/// failure.
pub fn apply_set_command(link: &mut LinkConfig, cmd: &SetPppoeCommand) -> Result<()> {
    match cmd {
        SetPppoeCommand::Iface { name, hook } => {
            anyhow::ensure!(!name.is_empty(), "iface name must not be empty");
            link.iface = name.clone();
            if let Some(h) = hook {
                link.parent_hook = h.clone();
            }
        },
        SetPppoeCommand::Service { name } => {
            link.service = name.clone();
        },
        SetPppoeCommand::Acname { name } => {
            link.ac_name = name.clone();
        },
        SetPppoeCommand::MaxPayload { value } => {
            LinkConfig::validate_max_payload(*value)?;
            link.max_payload = *value;
        },
        SetPppoeCommand::MacFormat { value } => {
            link.mac_format = *value;
        },
    }
    Ok(())
}

impl std::str::FromStr for MacFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "unformatted" => Ok(MacFormat::Unformatted),
            "unix-like" | "unix" => Ok(MacFormat::UnixLike),
            "cisco-like" | "cisco" => Ok(MacFormat::CiscoLike),
            "ietf" => Ok(MacFormat::Ietf),
            other => Err(format!("unknown mac-format {other:?}")),
        }
    }
}
