// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

/// Errors the wire codec can report. Purely about shape of the bytes; never
/// touches the network.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("header is {got} bytes, expected {expected}")]
    ShortHeader { got: usize, expected: usize },

    #[error("body_size {body_size} exceeds the {max} byte soft cap")]
    FramingTooLarge { body_size: u32, max: u32 },

    #[error("certitude_count {certitude_count} exceeds the {max} slot cap")]
    CertitudeCountTooLarge { certitude_count: u32, max: u32 },

    #[error("certitude_count is 0 but header reserves one certitude slot")]
    ZeroCertitudeCount,

    #[error("frame declares {expected} tail bytes but only {got} were supplied")]
    TruncatedTail { expected: usize, got: usize },
}
