use thiserror::Error;

/// The error taxonomy surfaced by the core to its peer (via a `Response` or
/// `Close` packet) or to the server's own log.
///
/// `Display` produces the exact string handed to `Response.error` / printed
/// by the CLI, so variants read as short, user-facing sentences rather than
/// Rust-debug noise.
#[derive(Debug, Error)]
pub enum RdftError {
    /// A packet failed to decode. The offending datagram is dropped; if its
    /// `request_id` can be attributed to a known handler, the handler is
    /// left alone, otherwise a Close is sent to the source.
    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] rdft_proto::MalformedPacket),

    /// A non-Request packet's `request_id` is not in the registry.
    #[error("unknown request id")]
    UnknownRequest,

    /// A request argument failed validation (empty path, path too long,
    /// empty user name, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested file or directory does not exist.
    #[error("not found")]
    NotFound,

    /// Password mismatch, or a path that would escape the storage root.
    ///
    /// Deliberately shares one message with `NotFound`-shaped cases at the
    /// handler boundary in some call sites: the server must not reveal
    /// whether a path under another user's root exists.
    #[error("permission denied")]
    PermissionDenied,

    /// No packet arrived before the soft recv timeout elapsed. Recovered
    /// internally; never surfaced to a peer.
    #[error("timed out")]
    Timeout,

    /// A hard socket error on send or recv.
    #[error("transport failure: {0}")]
    TransportFailure(rdft_net::TransportError),

    /// Underlying filesystem operation failed (permissions, disk full, ...).
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A directory archive could not be built or read.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl RdftError {
    /// True for errors that are routine and recovered locally (never sent to
    /// a peer, never escalated).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<rdft_net::TransportError> for RdftError {
    fn from(err: rdft_net::TransportError) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::TransportFailure(err)
        }
    }
}
