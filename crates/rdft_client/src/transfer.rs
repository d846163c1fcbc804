//! Client-side halves of the reliable transfer state machines in
//! `rdft_core::download` (receiver) and the sender discipline `rdft_core`
//! runs server-side for downloads, mirrored here for uploads.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use rdft_core::CongestionWindow;
use rdft_net::{Transport, TransportError, UdpTransport};
use rdft_proto::{Packet, ResponseSub};
use tracing::{debug, trace};

const INITIAL_RTT_ESTIMATE: Duration = Duration::from_millis(50);
const HANDSHAKE_RETRIES: u32 = 20;

/// The negotiated parameters a server `Response` hands back for a request.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub request_id: u32,
    pub data_size: u32,
    pub segments_amount: u32,
    pub single_segment_size: u32,
    pub sub: ResponseSub,
}

/// Sends `request` and retries until a matching `Response` arrives.
///
/// The client doesn't yet know its `request_id` (the server assigns one), so
/// the first `Response` received back from `server_addr` is taken as ours;
/// retransmitting the identical `Request` on every timeout is harmless since
/// the server dedupes nothing and simply allocates another id, which the
/// client has no way to tell apart from the first without some other request
/// in flight concurrently — acceptable for a client that runs one command at
/// a time (see the scheduling model).
pub fn send_request(transport: &mut UdpTransport, server_addr: SocketAddr, request: &Packet) -> Result<Negotiated> {
    let bytes = request.encode();
    for attempt in 0..HANDSHAKE_RETRIES {
        transport.send_to(&bytes, server_addr)?;
        match transport.recv_from() {
            Ok((data, _from)) => match Packet::decode(data) {
                Ok(Packet::Response {
                    request_id,
                    ok,
                    error,
                    data_size,
                    segments_amount,
                    single_segment_size,
                    sub,
                }) => {
                    if !ok {
                        bail!("server rejected request: {error}");
                    }
                    return Ok(Negotiated {
                        request_id,
                        data_size,
                        segments_amount,
                        single_segment_size,
                        sub,
                    });
                }
                Ok(other) => {
                    trace!(attempt, kind = ?other, "ignoring unrelated packet while awaiting response");
                }
                Err(err) => trace!(attempt, %err, "dropping malformed packet while awaiting response"),
            },
            Err(TransportError::Timeout) => continue,
            Err(err) => return Err(err).context("waiting for server response"),
        }
    }
    bail!("server did not respond after {HANDSHAKE_RETRIES} attempts")
}

/// Streams `payload` to the server as `Segment`s, windowed the same way the
/// server's download worker is, stopping once the server's `Close` arrives.
pub fn upload_stream(
    transport: &mut UdpTransport,
    server_addr: SocketAddr,
    request_id: u32,
    payload: &[u8],
    single_segment_size: u32,
    segments_amount: u32,
    cwnd_start: u32,
) -> Result<()> {
    let mut to_send: VecDeque<u32> = (0..segments_amount).collect();
    let mut in_flight: HashSet<u32> = HashSet::new();
    let mut cwnd = CongestionWindow::new(cwnd_start);
    let mut rtt = INITIAL_RTT_ESTIMATE;
    let mut last_refresh = Instant::now();

    loop {
        while Instant::now() < last_refresh + rtt
            && !to_send.is_empty()
            && (in_flight.len() as u32) < cwnd.cwnd()
        {
            let id = to_send.pop_front().expect("checked non-empty");
            let start = (id * single_segment_size) as usize;
            let end = (start + single_segment_size as usize).min(payload.len());
            let segment = Packet::Segment {
                request_id,
                segment_id: id,
                payload: Bytes::copy_from_slice(&payload[start..end]),
            };
            transport.send_to(&segment.encode(), server_addr)?;
            in_flight.insert(id);
        }

        let refresh_start = Instant::now();
        let deadline = refresh_start + rtt;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match transport.recv_from() {
                Ok((data, _from)) => match Packet::decode(data) {
                    Ok(Packet::Ack {
                        request_id: rid,
                        segment_id,
                    }) if rid == request_id => {
                        in_flight.remove(&segment_id);
                    }
                    Ok(Packet::Close { request_id: rid }) if rid == request_id => {
                        debug!(request_id, "upload acknowledged complete by server");
                        return Ok(());
                    }
                    Ok(_) | Err(_) => {}
                },
                Err(TransportError::Timeout) => break,
                Err(err) => return Err(err).context("receiving during upload"),
            }
        }
        rtt = refresh_start.elapsed().max(Duration::from_millis(1));

        let fully_acked = in_flight.is_empty();
        if !fully_acked {
            let mut stragglers: Vec<u32> = in_flight.drain().collect();
            stragglers.sort_unstable();
            for id in stragglers.into_iter().rev() {
                to_send.push_front(id);
            }
        }
        cwnd.refresh(fully_acked, rtt);
        last_refresh = Instant::now();
    }
}

/// Drives the receiving half of a download (or list): sends
/// `ReadyForDownloading`, ACKs every `Segment` as it arrives, and signals
/// `DownloadCompleted` once `segments_amount` unique segments are in hand.
pub fn download_stream(transport: &mut UdpTransport, server_addr: SocketAddr, negotiated: &Negotiated) -> Result<Vec<u8>> {
    let request_id = negotiated.request_id;
    let ready = Packet::ReadyForDownloading { request_id };
    transport.send_to(&ready.encode(), server_addr)?;

    let mut segments: HashMap<u32, Bytes> = HashMap::new();
    let mut last_ready_resend = Instant::now();

    while segments.len() < negotiated.segments_amount as usize {
        match transport.recv_from() {
            Ok((data, _from)) => match Packet::decode(data) {
                Ok(Packet::Segment {
                    request_id: rid,
                    segment_id,
                    payload,
                }) if rid == request_id => {
                    if segment_id >= negotiated.segments_amount {
                        trace!(request_id, segment_id, "dropping out-of-range segment id");
                    } else {
                        segments.entry(segment_id).or_insert(payload);
                        let ack = Packet::Ack { request_id, segment_id };
                        transport.send_to(&ack.encode(), server_addr)?;
                    }
                }
                Ok(_) | Err(_) => {}
            },
            Err(TransportError::Timeout) => {
                if last_ready_resend.elapsed() > Duration::from_secs(1) {
                    transport.send_to(&ready.encode(), server_addr)?;
                    last_ready_resend = Instant::now();
                }
            }
            Err(err) => return Err(err).context("receiving during download"),
        }
    }

    let completed = Packet::DownloadCompleted { request_id };
    for _ in 0..HANDSHAKE_RETRIES {
        transport.send_to(&completed.encode(), server_addr)?;
        match transport.recv_from() {
            Ok((data, _from)) => {
                if let Ok(Packet::Close { request_id: rid }) = Packet::decode(data) {
                    if rid == request_id {
                        break;
                    }
                }
            }
            Err(TransportError::Timeout) => continue,
            Err(err) => return Err(err).context("waiting for close"),
        }
    }

    let mut ordered_ids: Vec<u32> = segments.keys().copied().collect();
    ordered_ids.sort_unstable();
    let mut payload = Vec::with_capacity(negotiated.data_size as usize);
    for id in ordered_ids {
        payload.extend_from_slice(&segments[&id]);
    }
    Ok(payload)
}
