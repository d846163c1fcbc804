use thiserror::Error;

/// Failure decoding a [`crate::Message`] or a domain name within it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedPacket {
    #[error("buffer too short: need {needed} more byte(s)")]
    UnexpectedEof { needed: usize },
    #[error("domain name label exceeds 63 bytes")]
    LabelTooLong,
    #[error("domain name exceeds 255 bytes")]
    NameTooLong,
    #[error("compression pointer forms a loop or points past its own offset")]
    BadCompressionPointer,
    #[error("label is not valid UTF-8")]
    InvalidUtf8,
}
