use thiserror::Error;

/// Failure decoding a byte buffer into a [`crate::Packet`].
///
/// The codec is total: it never panics and never reads past the end of the
/// supplied buffer, regardless of how the bytes were produced.
#[derive(Debug, Clone, Error)]
pub enum MalformedPacket {
    /// The buffer ended before a fixed-width field could be read.
    #[error("unexpected end of packet (need {needed} more byte(s))")]
    UnexpectedEof {
        /// How many additional bytes the field required.
        needed: usize,
    },
    /// The `kind` byte did not match a known [`crate::Kind`].
    #[error("invalid packet kind byte: {0}")]
    InvalidKind(u8),
    /// The `sub_kind` byte did not match a known [`crate::SubKind`].
    #[error("invalid packet sub-kind byte: {0}")]
    InvalidSubKind(u8),
    /// A length-prefixed string was not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    /// A `kind`/`sub_kind` combination is not one the wire format defines.
    #[error("kind {kind:?} does not carry a {sub_kind:?} layer")]
    UnexpectedSubKind {
        /// The packet kind that was decoded.
        kind: crate::Kind,
        /// The sub-kind that was attached to it.
        sub_kind: crate::SubKind,
    },
    /// Trailing bytes remained after a packet was fully decoded.
    #[error("{0} trailing byte(s) after a fully decoded packet")]
    TrailingBytes(usize),
    /// A `Segment`'s `segment_id` does not fit within the negotiated
    /// `segments_amount` for its transfer.
    #[error("segment id {segment_id} is out of range for {segments_amount} segment(s)")]
    SegmentIdOutOfRange {
        /// The offending segment id.
        segment_id: u32,
        /// The transfer's negotiated segment count.
        segments_amount: u32,
    },
}
