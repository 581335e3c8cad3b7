// SPDX-License-Identifier: AGPL-3.0-or-later

//! The fixed-prefix-plus-variable-tail frame described in §3.1: a pure,
//! network-agnostic encode/decode pair. Nothing in this module touches a
//! socket.

use uuid::Uuid;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::{LittleEndian, U32},
};

use crate::wire::error::FramingError;

/// Size in bytes of the fixed prefix, including the one reserved
/// certitude slot that is always present (`certitudes[0]`).
pub const HEADER_LEN: usize = 34;

/// Default soft cap on `body_size`, in bytes. 16 MiB.
pub const DEFAULT_MAX_BODY: u32 = 16 * 1024 * 1024;

/// Upper bound on `certitude_count` (§8 boundary behaviour): at or above
/// this, the extra-certitude-slot tail would itself approach `u32::MAX`
/// bytes, so the frame is rejected outright rather than attempting the
/// allocation.
pub const MAX_CERTITUDE_COUNT: u32 = u32::MAX / 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Raw = 0,
    Filter = 1,
    Other = 2,
}

impl FrameType {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Raw,
            1 => Self::Filter,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseMode {
    None = 0,
    ClientOnly = 1,
    NextOnly = 2,
    Both = 3,
}

impl ResponseMode {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::None,
            1 => Self::ClientOnly,
            2 => Self::NextOnly,
            _ => Self::Both,
        }
    }

    pub fn replies_to_client(self) -> bool {
        matches!(self, Self::ClientOnly | Self::Both)
    }

    pub fn forwards_to_next(self) -> bool {
        matches!(self, Self::NextOnly | Self::Both)
    }
}

/// Byte-for-byte layout of the fixed 34-byte prefix. Only used internally
/// to get a checked, endian-correct view over a header slice; callers use
/// [`HeaderView`].
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
struct RawHeader {
    frame_type: u8,
    response_mode: u8,
    filter_code: U32<LittleEndian>,
    event_id: [u8; 16],
    body_size: U32<LittleEndian>,
    certitude_count: U32<LittleEndian>,
    certitude_0: U32<LittleEndian>,
}

/// Parsed view of one frame's header plus the offsets needed to slice its
/// tail out of the buffer that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderView {
    pub frame_type: FrameType,
    pub response_mode: ResponseMode,
    pub filter_code: u32,
    pub event_id: Uuid,
    pub body_size: u32,
    pub certitude_count: u32,
    /// `certitudes[0]`, always present.
    pub first_certitude: u16,
}

impl HeaderView {
    /// Number of extra 4-byte certitude slots living in the tail, before
    /// `body`.
    pub fn extra_certitude_bytes(&self) -> usize {
        self.certitude_count.saturating_sub(1) as usize * 4
    }

    pub fn tail_len(&self) -> usize {
        self.extra_certitude_bytes() + self.body_size as usize
    }
}

impl FrameType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl ResponseMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Parses the fixed-size header prefix. Does not read or validate the
/// variable tail; call [`parse_tail`] once `tail_len()` bytes are
/// available.
pub fn parse_header(buf: &[u8; HEADER_LEN]) -> Result<HeaderView, FramingError> {
    parse_header_with_cap(buf, DEFAULT_MAX_BODY)
}

pub fn parse_header_with_cap(
    buf: &[u8; HEADER_LEN],
    max_body: u32,
) -> Result<HeaderView, FramingError> {
    let raw = RawHeader::ref_from_bytes(buf.as_slice())
        .map_err(|_| FramingError::ShortHeader { got: buf.len(), expected: HEADER_LEN })?;

    let body_size = raw.body_size.get();
    if body_size > max_body {
        return Err(FramingError::FramingTooLarge { body_size, max: max_body });
    }

    let certitude_count = raw.certitude_count.get();
    if certitude_count >= MAX_CERTITUDE_COUNT {
        return Err(FramingError::CertitudeCountTooLarge { certitude_count, max: MAX_CERTITUDE_COUNT });
    }

    Ok(HeaderView {
        frame_type: FrameType::from_u8(raw.frame_type),
        response_mode: ResponseMode::from_u8(raw.response_mode),
        filter_code: raw.filter_code.get(),
        event_id: Uuid::from_bytes(raw.event_id),
        body_size,
        certitude_count,
        first_certitude: raw.certitude_0.get() as u16,
    })
}

/// Decoded tail: every certitude (including `certitudes[0]`, already known
/// from the header) plus the opaque body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailView {
    pub certitudes: Vec<u16>,
    pub body: Vec<u8>,
}

/// Parses the variable tail, given the header that preceded it. `tail`
/// must be exactly `header.tail_len()` bytes.
pub fn parse_tail(header: &HeaderView, tail: &[u8]) -> Result<TailView, FramingError> {
    let expected = header.tail_len();
    if tail.len() != expected {
        return Err(FramingError::TruncatedTail { expected, got: tail.len() });
    }

    let extra_bytes = header.extra_certitude_bytes();
    let mut certitudes = Vec::with_capacity(header.certitude_count.max(1) as usize);
    certitudes.push(header.first_certitude);
    for chunk in tail[..extra_bytes].chunks_exact(4) {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(chunk);
        certitudes.push(u32::from_le_bytes(buf) as u16);
    }

    Ok(TailView { certitudes, body: tail[extra_bytes..].to_vec() })
}

/// Serialises a full frame: header plus certitudes plus body. Allocates
/// exactly once. `certitudes` must contain at least one entry; only the
/// first is placed in the fixed header, the rest occupy the tail.
pub fn emit_frame(
    frame_type: FrameType,
    response_mode: ResponseMode,
    filter_code: u32,
    event_id: Uuid,
    certitudes: &[u16],
    body: &[u8],
) -> Vec<u8> {
    let certitude_count = certitudes.len().max(1) as u32;
    let extra = certitudes.len().saturating_sub(1);
    let packet_size = HEADER_LEN + extra * 4 + body.len();

    let mut out = vec![0u8; packet_size];

    let raw = RawHeader {
        frame_type: frame_type.as_u8(),
        response_mode: response_mode.as_u8(),
        filter_code: U32::new(filter_code),
        event_id: *event_id.as_bytes(),
        body_size: U32::new(body.len() as u32),
        certitude_count: U32::new(certitude_count),
        certitude_0: U32::new(*certitudes.first().unwrap_or(&0) as u32),
    };
    out[..HEADER_LEN].copy_from_slice(raw.as_bytes());

    let mut offset = HEADER_LEN;
    for &c in certitudes.iter().skip(1) {
        out[offset..offset + 4].copy_from_slice(&(c as u32).to_le_bytes());
        offset += 4;
    }
    out[offset..offset + body.len()].copy_from_slice(body);

    out
}
