// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// PPPoE peer MAC address rendering, selected by `set mac-format` (spec
/// §4.7). Affects only how `peer_mac` is reported through the calling/called
/// number accessors — never the bytes stored on the wire.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacFormat {
    /// `001122334455`
    #[default]
    #[serde(rename = "unformatted")]
    Unformatted,
    /// `00:11:22:33:44:55`
    #[serde(rename = "unix-like", alias = "unix")]
    UnixLike,
    /// `0011.2233.4455`
    #[serde(rename = "cisco-like", alias = "cisco")]
    CiscoLike,
    /// `00-11-22-33-44-55`
    #[serde(rename = "ietf")]
    Ietf,
}

impl fmt::Display for MacFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MacFormat::Unformatted => "unformatted",
            MacFormat::UnixLike => "unix-like",
            MacFormat::CiscoLike => "cisco-like",
            MacFormat::Ietf => "ietf",
        })
    }
}

/// Renders a 6-byte MAC address per `fmt`, matching the original source's
/// `PppoeCallingNum`/`PppoeCalledNum` branches (`pppoe.c:772-845`).
pub fn format_mac(mac: &[u8; 6], fmt: MacFormat) -> String {
    match fmt {
        MacFormat::Unformatted => {
            mac.iter().map(|b| format!("{b:02x}")).collect::<String>()
        },
        MacFormat::UnixLike => mac
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":"),
        MacFormat::CiscoLike => {
            let hex: String = mac.iter().map(|b| format!("{b:02x}")).collect();
            hex.as_bytes()
                .chunks(4)
                .map(|c| std::str::from_utf8(c).expect("hex chunk is ASCII"))
                .collect::<Vec<_>>()
                .join(".")
        },
        MacFormat::Ietf => mac
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join("-"),
    }
}

/// Whether this link originated the session (dialed out to an AC) or
/// accepted it (answered as an AC). Corresponds to spec §3's `direction`
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
        })
    }
}
