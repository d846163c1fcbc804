use std::net::SocketAddr;

use crate::error::TransportError;

/// The capability the rest of the crate needs from a datagram-shaped
/// transport: send a buffer to an address, and receive the next buffer and
/// its source address, giving up after a soft timeout.
///
/// Implementors decide what "soft timeout" means (a socket read timeout, a
/// poll budget, ...); callers only need to be able to tell a timeout apart
/// from a hard failure, which [`TransportError::is_timeout`] does.
pub trait Transport {
    /// Sends `bytes` to `addr`. Does not block waiting for any reply.
    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError>;

    /// Waits up to this transport's configured timeout for the next datagram.
    ///
    /// Returns [`TransportError::Timeout`] rather than blocking forever when
    /// nothing arrives, so a caller can interleave recv with its own
    /// housekeeping (congestion-window refresh, pending-response resend).
    fn recv_from(&mut self) -> Result<(Vec<u8>, SocketAddr), TransportError>;
}
