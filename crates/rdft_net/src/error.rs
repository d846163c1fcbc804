use std::io;

use thiserror::Error;

/// Failure from a [`crate::Transport`] operation.
///
/// Kept distinct from [`rdft_proto::MalformedPacket`]: this crate only ever
/// sees bytes in and out, never a decoded [`rdft_proto::Packet`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// No datagram arrived within the adapter's configured timeout.
    ///
    /// Callers (the dispatcher, the worker pool) treat this the same as "no
    /// work available this tick", not as a failure.
    #[error("recv timed out")]
    Timeout,
    /// The underlying socket reported an error unrelated to timeout.
    #[error("transport failure: {0}")]
    Io(#[from] io::Error),
    /// A `TcpFramedTransport` peer sent a frame missing its 2-byte port
    /// prefix, or the connection closed mid-frame.
    #[error("framed transport received a malformed frame: {0}")]
    Framing(String),
}

impl TransportError {
    /// True if this error is just "nothing showed up in time", as opposed to
    /// an actual socket fault.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
