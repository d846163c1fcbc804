use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use tracing::trace;

use crate::{TransportError, transport::Transport};

/// [`Transport`] over a plain `std::net::UdpSocket`.
///
/// The dispatcher and worker loops are blocking single-threaded loops (see
/// the server binary), so the socket is put in blocking mode with a read
/// timeout rather than non-blocking polling.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a new UDP socket at `addr` with the given soft recv timeout.
    pub fn bind(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(timeout))?;
        Ok(Self { socket })
    }

    /// Wraps an already-bound socket, overriding its read timeout.
    pub fn from_socket(socket: UdpSocket, timeout: Duration) -> Result<Self, TransportError> {
        socket.set_read_timeout(Some(timeout))?;
        Ok(Self { socket })
    }

    /// The local address this transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

impl Transport for UdpTransport {
    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        self.socket.send_to(bytes, addr)?;
        Ok(())
    }

    fn recv_from(&mut self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; rdft_proto::SOCKET_MAXSIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((len, addr)) => {
                buf.truncate(len);
                trace!(%addr, len, "recv_from");
                Ok((buf, addr))
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                Err(TransportError::Timeout)
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}
