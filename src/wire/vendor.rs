// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! BBF (Broadband Forum TR-101) vendor-specific sub-TLVs carried inside a
//! `Vendor` tag whose vendor id is `0x00000DE9`: Agent-Circuit-ID (type 1)
//! and Agent-Remote-ID (type 2).
//!
//! The original driver's inline sub-TLV loop computes its overrun check as
//! `len1 > len - pos - 2`, which underflows when `pos` is within 2 bytes of
//! `len` (both are `size_t`). This module instead tracks the remaining
//! slice directly and never subtracts into a length that could go
//! negative, so a crafted sub-TLV can only ever end iteration early, never
//! panic or read out of bounds.

/// Max bytes kept per sub-TLV field, matching the original's
/// `agent_cid`/`agent_rid` buffer size (one byte reserved for the
/// terminator there; here it is just a cap on the owned `String`).
pub const MAX_AGENT_ID_LEN: usize = 63;

/// Agent-Circuit-ID / Agent-Remote-ID extracted from a BBF vendor tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentIds {
    pub circuit_id: Option<String>,
    pub remote_id: Option<String>,
}

/// Parses the sub-TLV list following the vendor id inside a BBF
/// `0x00000DE9` vendor tag (i.e. `vendor_body` is the slice
/// [`crate::wire::tag::find_vendor`] returns).
pub fn parse_bbf_sub_tlvs(vendor_body: &[u8]) -> AgentIds {
    let mut ids = AgentIds::default();
    let mut rest = vendor_body;

    while rest.len() >= 2 {
        let sub_type = rest[0];
        let sub_len = rest[1] as usize;
        let value_start = 2;
        let value_end = value_start + sub_len;
        if value_end > rest.len() {
            break;
        }
        let value = &rest[value_start..value_end];
        let truncated = &value[..value.len().min(MAX_AGENT_ID_LEN)];
        let rendered = String::from_utf8_lossy(truncated).into_owned();
        match sub_type {
            1 => ids.circuit_id = Some(rendered),
            2 => ids.remote_id = Some(rendered),
            _ => {},
        }
        rest = &rest[value_end..];
    }

    ids
}
