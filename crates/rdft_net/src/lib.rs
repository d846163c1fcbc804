//! Transport adapters for the Reliable Datagram File Transfer protocol.
//!
//! `rdft_core` talks to the network only through the [`Transport`] trait, so
//! it never has to know whether the underlying medium is UDP or framed TCP.

mod error;
mod tcp_framed;
mod transport;
mod udp;

pub use error::TransportError;
pub use tcp_framed::TcpFramedTransport;
pub use transport::Transport;
pub use udp::UdpTransport;

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr};
    use std::time::Duration;

    use super::*;

    #[test]
    fn udp_round_trip() {
        let mut a = UdpTransport::bind((Ipv4Addr::LOCALHOST, 0), Duration::from_millis(200))
            .expect("bind a");
        let mut b = UdpTransport::bind((Ipv4Addr::LOCALHOST, 0), Duration::from_millis(200))
            .expect("bind b");
        let b_addr = b.local_addr().expect("b addr");

        a.send_to(b"hello", b_addr).expect("send");
        let (payload, _from) = b.recv_from().expect("recv");
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn udp_recv_times_out_when_idle() {
        let mut a = UdpTransport::bind((Ipv4Addr::LOCALHOST, 0), Duration::from_millis(30))
            .expect("bind a");
        let err = a.recv_from().expect_err("nothing was sent");
        assert!(err.is_timeout());
    }

    #[test]
    fn tcp_framed_round_trip_preserves_logical_port() {
        let mut server =
            TcpFramedTransport::bind((Ipv4Addr::LOCALHOST, 0), Duration::from_millis(500))
                .expect("bind server");
        let server_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let _ = server_addr;

        // rebind on an OS-assigned port so the client can discover it
        drop(server);
        let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let bound = listener.local_addr().unwrap();
        drop(listener);

        let mut server = TcpFramedTransport::bind(bound, Duration::from_millis(500))
            .expect("bind server on fixed port");

        let logical_port = 4242u16;
        let mut client = TcpFramedTransport::connect(
            SocketAddr::new(bound.ip(), bound.port()),
            Duration::from_millis(500),
        )
        .expect("connect");

        client
            .send_to(b"segment-bytes", SocketAddr::new(bound.ip(), logical_port))
            .expect("client send");

        let (payload, from) = server.recv_from().expect("server recv");
        assert_eq!(payload, b"segment-bytes");
        assert_eq!(from.port(), logical_port);
    }
}
