use thiserror::Error;

/// Failure decoding a [`crate::Packet`] or its options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedPacket {
    #[error("buffer too short: need {needed} more byte(s)")]
    UnexpectedEof { needed: usize },
    #[error("missing or incorrect DHCP magic cookie")]
    BadMagicCookie,
    #[error("option {tag} has length {len}, expected {expected}")]
    BadOptionLength { tag: u8, len: usize, expected: usize },
    #[error("unknown op code {0}")]
    InvalidOp(u8),
}
