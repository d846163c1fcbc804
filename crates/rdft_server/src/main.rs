mod cli;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rdft_net::{TcpFramedTransport, Transport, TransportError, UdpTransport};
use rdft_proto::Packet;
use tracing::{debug_span, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, TransportKind};

/// An owned, dynamically dispatched transport, so the dispatch loop doesn't
/// need to care whether it's actually UDP or framed TCP underneath.
type BoxedTransport = Box<dyn Transport + Send>;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn bind_transport(cli: &Cli, timeout: Duration) -> anyhow::Result<BoxedTransport> {
    let addr = format!("{}:{}", cli.host, cli.port);
    match cli.transport {
        TransportKind::Udp => {
            let transport = UdpTransport::bind(&addr, timeout)
                .with_context(|| format!("binding UDP transport on {addr}"))?;
            Ok(Box::new(transport))
        }
        TransportKind::Tcp => {
            let transport = TcpFramedTransport::bind(&addr, timeout)
                .with_context(|| format!("binding TCP transport on {addr}"))?;
            Ok(Box::new(transport))
        }
    }
}

/// A [`rdft_core::PacketSink`] that hands every send off to the shared,
/// mutex-guarded transport, so download workers on the pool can reply
/// without the dispatcher giving up ownership of it.
struct TransportSink {
    transport: Arc<Mutex<BoxedTransport>>,
}

impl rdft_core::PacketSink for TransportSink {
    fn send(&self, bytes: &[u8], addr: std::net::SocketAddr) -> Result<(), rdft_core::RdftError> {
        let mut guard = self.transport.lock().expect("transport mutex poisoned");
        guard.send_to(bytes, addr).map_err(Into::into)
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = cli.resolve_config();

    let transport = bind_transport(&cli, config.socket_timeout)?;
    let transport = Arc::new(Mutex::new(transport));
    let sink = Arc::new(TransportSink {
        transport: transport.clone(),
    });

    let mut registry = rdft_core::Registry::new(config, sink).context("initializing registry")?;

    info!(host = %cli.host, port = cli.port, transport = ?cli.transport, "rdft-server listening");

    loop {
        let received = {
            let mut guard = transport.lock().expect("transport mutex poisoned");
            guard.recv_from()
        };
        match received {
            Ok((bytes, from)) => {
                let packet = match Packet::decode(bytes) {
                    Ok(packet) => packet,
                    Err(err) => {
                        warn!(%from, %err, "dropping malformed packet");
                        continue;
                    }
                };
                let span = debug_span!("packet", request_id = packet.request_id(), %from);
                let _enter = span.enter();
                registry.handle_packet(packet, from);
            }
            Err(err) if matches!(err, TransportError::Timeout) => continue,
            Err(err) => {
                warn!(%err, "transport error while receiving");
            }
        }
    }
}
