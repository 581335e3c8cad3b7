// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component A: the wire codec. Serialises and parses the fixed-prefix,
//! variable-tail request/response frame described in §3.1. This module is
//! pure — it never touches a socket; callers own the I/O.

pub mod error;
pub mod frame;

pub use error::FramingError;
pub use frame::{
    DEFAULT_MAX_BODY, FrameType, HEADER_LEN, HeaderView, ResponseMode, TailView, emit_frame,
    parse_header, parse_header_with_cap, parse_tail,
};
