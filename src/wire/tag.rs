// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Tag parsing over a PPPoE discovery header's tag area.
//!
//! The tag area is untrusted input: only the outer header's declared
//! length has been checked by [`crate::wire::header::parse_header`]. Every
//! tag's own `tag_len` is re-validated against the remaining slice before
//! any byte of it is read — no tag is ever allowed to claim data past the
//! envelope [`crate::wire::header::parse_header`] already bounded.

use core::fmt;

/// Recognized PPPoE tag types (RFC 2516 §5, RFC 4638, RFC 4937).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    EndOfList,
    ServiceName,
    AcName,
    HostUniq,
    AcCookie,
    Vendor,
    RelaySessionId,
    MaxPayload,
    ServiceNameError,
    AcSystemError,
    GenericError,
    Credits,
    Metrics,
    SequenceNumber,
    Hurl,
    Motm,
    IpRouteAdd,
    Other(u16),
}

impl TagType {
    pub const fn from_u16(v: u16) -> Self {
        match v {
            0x0000 => TagType::EndOfList,
            0x0101 => TagType::ServiceName,
            0x0102 => TagType::AcName,
            0x0103 => TagType::HostUniq,
            0x0104 => TagType::AcCookie,
            0x0105 => TagType::Vendor,
            0x0110 => TagType::RelaySessionId,
            0x0120 => TagType::MaxPayload,
            0x0201 => TagType::ServiceNameError,
            0x0202 => TagType::AcSystemError,
            0x0203 => TagType::GenericError,
            0x0106 => TagType::Credits,
            0x0107 => TagType::Metrics,
            0x0108 => TagType::SequenceNumber,
            0x0111 => TagType::Hurl,
            0x0112 => TagType::Motm,
            0x0121 => TagType::IpRouteAdd,
            other => TagType::Other(other),
        }
    }

    pub const fn to_u16(self) -> u16 {
        match self {
            TagType::EndOfList => 0x0000,
            TagType::ServiceName => 0x0101,
            TagType::AcName => 0x0102,
            TagType::HostUniq => 0x0103,
            TagType::AcCookie => 0x0104,
            TagType::Vendor => 0x0105,
            TagType::RelaySessionId => 0x0110,
            TagType::MaxPayload => 0x0120,
            TagType::ServiceNameError => 0x0201,
            TagType::AcSystemError => 0x0202,
            TagType::GenericError => 0x0203,
            TagType::Credits => 0x0106,
            TagType::Metrics => 0x0107,
            TagType::SequenceNumber => 0x0108,
            TagType::Hurl => 0x0111,
            TagType::Motm => 0x0112,
            TagType::IpRouteAdd => 0x0121,
            TagType::Other(v) => v,
        }
    }

    /// Human name for `tracing` fields, mirroring the original's `tag2str`
    /// lookup table.
    pub const fn name(self) -> &'static str {
        match self {
            TagType::EndOfList => "End-Of-List",
            TagType::ServiceName => "Service-Name",
            TagType::AcName => "AC-Name",
            TagType::HostUniq => "Host-Uniq",
            TagType::AcCookie => "AC-Cookie",
            TagType::Vendor => "Vendor-Specific",
            TagType::RelaySessionId => "Relay-Session-Id",
            TagType::MaxPayload => "PPP-Max-Payload",
            TagType::ServiceNameError => "Service-Name-Error",
            TagType::AcSystemError => "AC-System-Error",
            TagType::GenericError => "Generic-Error",
            TagType::Credits => "Credits",
            TagType::Metrics => "Metrics",
            TagType::SequenceNumber => "Sequence Number",
            TagType::Hurl => "HURL",
            TagType::Motm => "MOTM",
            TagType::IpRouteAdd => "IP_Route_Add",
            TagType::Other(_) => "Unknown",
        }
    }
}

/// A single parsed tag: type plus a borrowed view of its value bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TagView<'a> {
    pub tag_type: TagType,
    pub value: &'a [u8],
}

impl fmt::Debug for TagView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagView")
            .field("tag_type", &self.tag_type.name())
            .field("len", &self.value.len())
            .finish()
    }
}

/// Bounded iterator over a tag area. Never reads past `area`'s length: a
/// tag whose declared `tag_len` would overrun the remaining bytes ends
/// iteration instead of being yielded.
pub struct TagIter<'a> {
    rest: &'a [u8],
    truncated: bool,
}

impl<'a> TagIter<'a> {
    pub fn new(area: &'a [u8]) -> Self {
        Self {
            rest: area,
            truncated: false,
        }
    }

    /// True once the iterator has stopped early because a tag's declared
    /// length overran the remaining bytes.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl<'a> Iterator for TagIter<'a> {
    type Item = TagView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.truncated {
            return None;
        }
        // Need at least the 4-byte tag header (type + len) to continue.
        if self.rest.len() < 4 {
            return None;
        }
        let tag_type = TagType::from_u16(u16::from_be_bytes([self.rest[0], self.rest[1]]));
        let tag_len = u16::from_be_bytes([self.rest[2], self.rest[3]]) as usize;
        let value_start = 4;
        let value_end = value_start + tag_len;
        if value_end > self.rest.len() {
            self.truncated = true;
            return None;
        }
        let value = &self.rest[value_start..value_end];
        self.rest = &self.rest[value_end..];
        Some(TagView { tag_type, value })
    }
}

/// Finds the first tag of `wanted` type in `area`.
pub fn find(area: &[u8], wanted: TagType) -> Option<TagView<'_>> {
    TagIter::new(area).find(|t| t.tag_type.to_u16() == wanted.to_u16())
}

/// Finds the first `Vendor` tag whose 4-byte vendor id matches `vendor_id`
/// (network byte order), returning the bytes after the vendor id.
pub fn find_vendor(area: &[u8], vendor_id: u32) -> Option<&[u8]> {
    TagIter::new(area).find_map(|t| {
        if t.tag_type != TagType::Vendor || t.value.len() < 4 {
            return None;
        }
        let got = u32::from_be_bytes([t.value[0], t.value[1], t.value[2], t.value[3]]);
        (got == vendor_id).then(|| &t.value[4..])
    })
}

/// Renders every parsed tag as a human-readable line, for
/// `tracing::trace!`-level diagnostics only. Mirrors `print_tags()` from
/// the original driver.
pub fn debug_dump(area: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for tag in TagIter::new(area) {
        let rendered = match tag.tag_type {
            TagType::EndOfList => {
                if tag.value.is_empty() {
                    "ok".to_string()
                } else {
                    "TAG_LENGTH is not zero".to_string()
                }
            },
            TagType::ServiceName | TagType::AcName => {
                if tag.value.is_empty() {
                    "Any service is acceptable".to_string()
                } else {
                    String::from_utf8_lossy(tag.value).into_owned()
                }
            },
            TagType::HostUniq | TagType::AcCookie | TagType::RelaySessionId => {
                format!("0x{}", hex_encode(tag.value))
            },
            TagType::Vendor => {
                if tag.value.len() >= 4 {
                    format!(
                        "0x{} 0x{}",
                        hex_encode(&tag.value[..4]),
                        hex_encode(&tag.value[4..])
                    )
                } else {
                    "TAG_LENGTH must be >= 4".to_string()
                }
            },
            TagType::MaxPayload => {
                if tag.value.len() == 2 {
                    u16::from_be_bytes([tag.value[0], tag.value[1]]).to_string()
                } else {
                    "TAG_LENGTH is not 2".to_string()
                }
            },
            TagType::ServiceNameError | TagType::AcSystemError | TagType::GenericError => {
                String::from_utf8_lossy(tag.value).into_owned()
            },
            TagType::Credits
            | TagType::Metrics
            | TagType::SequenceNumber
            | TagType::Hurl
            | TagType::Motm
            | TagType::IpRouteAdd => "Not implemented".to_string(),
            TagType::Other(v) => format!("0x{v:04x}"),
        };
        out.push(format!("TAG: {}, Value: {}", tag.tag_type.name(), rendered));
    }
    out
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_bytes(tag_type: u16, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&tag_type.to_be_bytes());
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn iterates_multiple_tags() {
        let mut area = tag_bytes(TagType::ServiceName.to_u16(), b"isp");
        area.extend(tag_bytes(TagType::AcName.to_u16(), b"ac1"));
        let tags: Vec<_> = TagIter::new(&area).collect();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].tag_type, TagType::ServiceName);
        assert_eq!(tags[0].value, b"isp");
        assert_eq!(tags[1].tag_type, TagType::AcName);
    }

    #[test]
    fn stops_and_flags_truncation_on_overrun() {
        let mut area = tag_bytes(TagType::ServiceName.to_u16(), b"isp");
        // Corrupt the trailing tag's declared length so it overruns.
        area.extend_from_slice(&TagType::AcName.to_u16().to_be_bytes());
        area.extend_from_slice(&100u16.to_be_bytes());
        area.extend_from_slice(b"short");

        let mut iter = TagIter::new(&area);
        let first = iter.next();
        assert!(first.is_some());
        assert!(iter.next().is_none());
        assert!(iter.truncated());
    }

    #[test]
    fn find_locates_by_type() {
        let mut area = tag_bytes(TagType::ServiceName.to_u16(), b"isp");
        area.extend(tag_bytes(TagType::MaxPayload.to_u16(), &1492u16.to_be_bytes()));
        let found = find(&area, TagType::MaxPayload).unwrap();
        assert_eq!(found.value, 1492u16.to_be_bytes());
        assert!(find(&area, TagType::HostUniq).is_none());
    }

    #[test]
    fn find_vendor_matches_vendor_id() {
        let mut vendor_value = 0x00000DE9u32.to_be_bytes().to_vec();
        vendor_value.extend_from_slice(b"circuit-id-bytes");
        let area = tag_bytes(TagType::Vendor.to_u16(), &vendor_value);
        let found = find_vendor(&area, 0x00000DE9).expect("vendor tag present");
        assert_eq!(found, b"circuit-id-bytes");
        assert!(find_vendor(&area, 0xdeadbeef).is_none());
    }

    #[test]
    fn empty_area_yields_nothing() {
        assert_eq!(TagIter::new(&[]).count(), 0);
    }
}
