// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RFC 2516 / RFC 4638 wire format: discovery header, tag list, and BBF
//! (TR-101) vendor sub-TLVs.

pub mod header;
pub mod tag;
pub mod vendor;

use crate::error::PppoeError;

/// BBF vendor id carrying Agent-Circuit-ID / Agent-Remote-ID sub-TLVs.
pub const BBF_VENDOR_ID: u32 = 0x00000DE9;

/// Parsed view of an incoming discovery frame's interesting tags, built in
/// one pass over the tag area.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryTags {
    pub service_name: Option<String>,
    pub host_uniq: Option<Vec<u8>>,
    pub max_payload: Option<u16>,
    pub agent_circuit_id: Option<String>,
    pub agent_remote_id: Option<String>,
}

/// Decodes a discovery frame's header and the handful of tags this
/// subsystem actually acts on. `buf` is the Ethernet payload starting at
/// the PPPoE discovery header (the 14-byte Ethernet header has already
/// been stripped by the caller).
pub fn decode_discovery(buf: &[u8]) -> Result<(header::RawHeader, DiscoveryTags), PppoeError> {
    let (hdr, area) = header::parse_header(buf)?;

    let service_name = tag::find(area, tag::TagType::ServiceName)
        .map(|t| String::from_utf8_lossy(t.value).into_owned());

    let host_uniq = tag::find(area, tag::TagType::HostUniq).map(|t| t.value.to_vec());

    let max_payload = tag::find(area, tag::TagType::MaxPayload).and_then(|t| {
        (t.value.len() == 2).then(|| u16::from_be_bytes([t.value[0], t.value[1]]))
    });

    let (agent_circuit_id, agent_remote_id) = match tag::find_vendor(area, BBF_VENDOR_ID) {
        Some(body) => {
            let ids = vendor::parse_bbf_sub_tlvs(body);
            (ids.circuit_id, ids.remote_id)
        },
        None => (None, None),
    };

    Ok((hdr, DiscoveryTags {
        service_name,
        host_uniq,
        max_payload,
        agent_circuit_id,
        agent_remote_id,
    }))
}
