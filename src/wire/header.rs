// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The RFC 2516 discovery header: a fixed 6-byte prefix in front of the
//! tag list (`struct pppoe_hdr` in the original driver).

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Discovery-phase VER/TYPE octet value defined by RFC 2516 §4 (both
/// nibbles fixed at `1`).
pub const PPPOE_VER_TYPE: u8 = 0x11;

/// PPPoE discovery codes (RFC 2516 §4) plus the session-data code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Padi,
    Pado,
    Padr,
    Pads,
    Padt,
    /// `0x00`: a PPP session-data frame, not a discovery message.
    SessionData,
    /// Anything else — dropped by `CtrlDemux` as malformed.
    Unknown(u8),
}

impl Code {
    pub const fn from_u8(v: u8) -> Self {
        match v {
            0x00 => Code::SessionData,
            0x09 => Code::Padi,
            0x07 => Code::Pado,
            0x19 => Code::Padr,
            0x65 => Code::Pads,
            0xa7 => Code::Padt,
            other => Code::Unknown(other),
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Code::SessionData => 0x00,
            Code::Padi => 0x09,
            Code::Pado => 0x07,
            Code::Padr => 0x19,
            Code::Pads => 0x65,
            Code::Padt => 0xa7,
            Code::Unknown(v) => v,
        }
    }
}

/// Wire-safe 6-byte discovery header, network byte order throughout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawHeader {
    ver_type: u8,
    code: u8,
    session_id: [u8; 2],
    length: [u8; 2],
}

impl RawHeader {
    pub const SIZE: usize = 6;

    pub fn code(&self) -> Code {
        Code::from_u8(self.code)
    }

    pub fn session_id(&self) -> u16 {
        u16::from_be_bytes(self.session_id)
    }

    /// Length of the tag area following this header, in bytes.
    pub fn payload_length(&self) -> u16 {
        u16::from_be_bytes(self.length)
    }

    pub fn new(code: Code, session_id: u16, payload_length: u16) -> Self {
        Self {
            ver_type: PPPOE_VER_TYPE,
            code: code.to_u8(),
            session_id: session_id.to_be_bytes(),
            length: payload_length.to_be_bytes(),
        }
    }
}

/// Parses the 6-byte discovery header from `buf`, validating the VER/TYPE
/// octet and that `buf` is at least as long as the declared tag-area
/// length. Returns the header and the tag-area slice.
pub fn parse_header(buf: &[u8]) -> Result<(RawHeader, &[u8]), crate::error::PppoeError> {
    if buf.len() < RawHeader::SIZE {
        return Err(crate::error::PppoeError::MalformedFrame(format!(
            "frame too short for discovery header: {} bytes",
            buf.len()
        )));
    }
    let header = RawHeader::read_from_bytes(&buf[..RawHeader::SIZE])
        .map_err(|_| crate::error::PppoeError::MalformedFrame("header alignment".to_string()))?;
    if header.ver_type != PPPOE_VER_TYPE {
        return Err(crate::error::PppoeError::MalformedFrame(format!(
            "bad VER/TYPE octet 0x{:02x}",
            header.ver_type
        )));
    }
    let declared = header.payload_length() as usize;
    let available = &buf[RawHeader::SIZE..];
    if available.len() < declared {
        return Err(crate::error::PppoeError::MalformedFrame(format!(
            "declared length {declared} exceeds frame ({} bytes available)",
            available.len()
        )));
    }
    Ok((header, &available[..declared]))
}
