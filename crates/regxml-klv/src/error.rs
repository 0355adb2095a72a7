//! Error types for regxml-klv.

use thiserror::Error;

/// KLV decoding errors.
#[derive(Debug, Error)]
#[must_use]
pub enum Error {
    #[error("unexpected end of data: need {need} bytes, have {have}")]
    UnexpectedEof { need: usize, have: usize },

    #[error("BER length field announces {0} octets, maximum is 8")]
    BerTooLong(u8),

    #[error("BER length does not fit the platform length type")]
    BerOverflow,

    #[error("invalid {kind} URN: {text:?}")]
    InvalidUrn { kind: &'static str, text: String },

    #[error("triplet key {0} is not a UL")]
    KeyNotAUl(String),

    #[error("triplet with key {0} is not a local set")]
    NotALocalSet(String),

    #[error("no identification registered for local tag 0x{0:04x}")]
    UnknownLocalTag(u64),

    #[error("batch item of {have} bytes is shorter than the {need} required")]
    BatchItemTooShort { need: usize, have: usize },
}

/// Result type alias for KLV operations.
pub type Result<T> = std::result::Result<T, Error>;
