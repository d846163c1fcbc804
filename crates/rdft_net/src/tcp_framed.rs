use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::{TransportError, transport::Transport};

/// Frame header: a 2-byte big-endian logical port, then a 4-byte big-endian
/// payload length. The port lets the receiver reconstruct a `(host, port)`
/// pair equivalent to what a `UdpTransport` peer would see, independent of
/// whatever ephemeral TCP port the OS picked for the connection; the length
/// prefix is what makes framing over a byte stream possible at all.
const HEADER_LEN: usize = 2 + 4;

struct Connection {
    stream: TcpStream,
    peer_ip: IpAddr,
    buf: Vec<u8>,
}

impl Connection {
    /// Tries to pull one complete frame out of `self.buf`, reading more bytes
    /// from the socket first if nothing is buffered yet.
    fn try_recv(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>, TransportError> {
        let mut chunk = [0u8; 4096];
        loop {
            if self.buf.len() >= HEADER_LEN {
                let port = u16::from_be_bytes([self.buf[0], self.buf[1]]);
                let len = u32::from_be_bytes([self.buf[2], self.buf[3], self.buf[4], self.buf[5]]) as usize;
                if self.buf.len() >= HEADER_LEN + len {
                    let payload = self.buf[HEADER_LEN..HEADER_LEN + len].to_vec();
                    self.buf.drain(..HEADER_LEN + len);
                    let addr = SocketAddr::new(self.peer_ip, port);
                    return Ok(Some((payload, addr)));
                }
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(TransportError::Framing(
                        "peer closed connection mid-frame".into(),
                    ));
                }
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None);
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn send(&mut self, bytes: &[u8], port: u16) -> Result<(), TransportError> {
        let mut framed = Vec::with_capacity(HEADER_LEN + bytes.len());
        framed.extend_from_slice(&port.to_be_bytes());
        framed.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        framed.extend_from_slice(bytes);
        self.stream.write_all(&framed)?;
        Ok(())
    }
}

/// [`Transport`] over TCP connections, framing each logical datagram with a
/// sender-port prefix so the rest of the stack can treat it like UDP.
///
/// One [`Connection`] is kept per remote IP. A server instance accepts new
/// connections opportunistically inside `recv_from`; a client instance opens
/// its one connection eagerly in [`TcpFramedTransport::connect`].
pub struct TcpFramedTransport {
    listener: Option<TcpListener>,
    connections: HashMap<IpAddr, Connection>,
    timeout: Duration,
}

impl TcpFramedTransport {
    /// Listens for incoming framed connections at `addr`.
    pub fn bind(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener: Some(listener),
            connections: HashMap::new(),
            timeout,
        })
    }

    /// Opens a single framed connection to `addr`, for client use.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        let mut connections = HashMap::new();
        connections.insert(
            addr.ip(),
            Connection {
                stream,
                peer_ip: addr.ip(),
                buf: Vec::new(),
            },
        );
        Ok(Self {
            listener: None,
            connections,
            timeout,
        })
    }

    fn accept_pending(&mut self) -> Result<(), TransportError> {
        let Some(listener) = &self.listener else {
            return Ok(());
        };
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_nodelay(true)?;
                    debug!(%peer, "accepted framed connection");
                    self.connections.insert(
                        peer.ip(),
                        Connection {
                            stream,
                            peer_ip: peer.ip(),
                            buf: Vec::new(),
                        },
                    );
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock) => return Ok(()),
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn connection_for(&mut self, addr: SocketAddr) -> Result<&mut Connection, TransportError> {
        if !self.connections.contains_key(&addr.ip()) {
            let stream = TcpStream::connect(addr)?;
            stream.set_read_timeout(Some(self.timeout))?;
            stream.set_nodelay(true)?;
            self.connections.insert(
                addr.ip(),
                Connection {
                    stream,
                    peer_ip: addr.ip(),
                    buf: Vec::new(),
                },
            );
        }
        Ok(self.connections.get_mut(&addr.ip()).expect("just inserted"))
    }
}

impl Transport for TcpFramedTransport {
    fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        self.connection_for(addr)?.send(bytes, addr.port())
    }

    fn recv_from(&mut self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        self.accept_pending()?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let mut dead = Vec::new();
            for (ip, conn) in &mut self.connections {
                match conn.try_recv() {
                    Ok(Some(frame)) => {
                        trace!(addr = %frame.1, "recv_from (framed)");
                        return Ok(frame);
                    }
                    Ok(None) => {}
                    Err(TransportError::Framing(reason)) => {
                        debug!(%ip, reason, "dropping framed connection");
                        dead.push(*ip);
                    }
                    Err(e) => return Err(e),
                }
            }
            for ip in dead {
                self.connections.remove(&ip);
            }

            if Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }
            self.accept_pending()?;
        }
    }
}
