//! Sender side of a bulk transfer: the windowed, CUBIC-controlled worker
//! that streams a payload as `Segment`s and retires them on `Ack`.

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rdft_proto::Packet;
use tracing::{debug, trace, trace_span};

use crate::cubic::CongestionWindow;
use crate::sink::PacketSink;

const INITIAL_RTT_ESTIMATE: Duration = Duration::from_millis(50);
const MAILBOX_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Everything one download worker needs to stream a payload to completion.
pub struct DownloadWorker {
    request_id: u32,
    client_addr: SocketAddr,
    payload: Vec<u8>,
    single_segment_size: u32,
    segments_amount: u32,
    mailbox: flume::Receiver<Packet>,
    sink: Arc<dyn PacketSink>,
    cwnd_start: u32,
}

impl DownloadWorker {
    /// Builds a worker ready to stream `payload` once spawned.
    #[must_use]
    pub fn new(
        request_id: u32,
        client_addr: SocketAddr,
        payload: Vec<u8>,
        single_segment_size: u32,
        segments_amount: u32,
        mailbox: flume::Receiver<Packet>,
        sink: Arc<dyn PacketSink>,
        cwnd_start: u32,
    ) -> Self {
        Self {
            request_id,
            client_addr,
            payload,
            single_segment_size,
            segments_amount,
            mailbox,
            sink,
            cwnd_start,
        }
    }

    fn segment_payload(&self, segment_id: u32) -> &[u8] {
        let start = (segment_id * self.single_segment_size) as usize;
        let end = (start + self.single_segment_size as usize).min(self.payload.len());
        &self.payload[start..end]
    }

    fn send_segment(&self, segment_id: u32) {
        let packet = Packet::Segment {
            request_id: self.request_id,
            segment_id,
            payload: bytes::Bytes::copy_from_slice(self.segment_payload(segment_id)),
        };
        if let Err(err) = self.sink.send(&packet.encode(), self.client_addr) {
            debug!(request_id = self.request_id, %err, segment_id, "failed to send segment");
        }
    }

    fn send_close(&self) {
        let packet = Packet::Close {
            request_id: self.request_id,
        };
        let _ = self.sink.send(&packet.encode(), self.client_addr);
    }

    /// Drains the mailbox for up to `budget`, applying ACKs to `in_flight`.
    ///
    /// Returns `true` if a `DownloadCompleted` was observed, at which point
    /// the caller must stop regardless of any remaining `to_send`/`in_flight`
    /// state.
    fn drain_mailbox(&self, budget: Duration, in_flight: &mut HashSet<u32>) -> bool {
        let deadline = Instant::now() + budget;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.mailbox.recv_timeout(remaining.min(MAILBOX_POLL_INTERVAL)) {
                Ok(Packet::Ack { segment_id, .. }) => {
                    // Idempotent: removing an id not present (already ACKed
                    // this cycle, or ACKed in an earlier one) is a no-op.
                    in_flight.remove(&segment_id);
                    trace!(request_id = self.request_id, segment_id, "ack");
                }
                Ok(Packet::DownloadCompleted { .. }) => return true,
                Ok(other) => {
                    trace!(request_id = self.request_id, kind = ?other, "ignoring unrelated packet on download handler");
                }
                Err(flume::RecvTimeoutError::Timeout) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                }
                Err(flume::RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    /// Runs the windowed send/refresh loop until `DownloadCompleted` arrives
    /// or the mailbox is disconnected (peer gone).
    pub fn run(self) {
        let span = trace_span!("download", request_id = self.request_id);
        let _enter = span.enter();

        let mut to_send: VecDeque<u32> = (0..self.segments_amount).collect();
        let mut in_flight: HashSet<u32> = HashSet::new();
        let mut cwnd = CongestionWindow::new(self.cwnd_start);
        let mut rtt = INITIAL_RTT_ESTIMATE;
        let mut last_refresh = Instant::now();

        loop {
            while Instant::now() < last_refresh + rtt
                && !to_send.is_empty()
                && (in_flight.len() as u32) < cwnd.cwnd()
            {
                let id = to_send.pop_front().expect("checked non-empty");
                self.send_segment(id);
                in_flight.insert(id);
            }

            let refresh_start = Instant::now();
            if self.drain_mailbox(rtt, &mut in_flight) {
                debug!(request_id = self.request_id, "download completed by peer");
                self.send_close();
                return;
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
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rdft_proto::Packet;

    use super::*;
    use crate::error::RdftError;

    struct RecordingSink {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl PacketSink for RecordingSink {
        fn send(&self, bytes: &[u8], _addr: SocketAddr) -> Result<(), RdftError> {
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    #[test]
    fn streams_all_segments_and_closes_on_completion() {
        let sink = Arc::new(RecordingSink {
            sent: Mutex::new(Vec::new()),
        });
        let (tx, rx) = flume::unbounded();
        let payload = b"abcdefghij".to_vec();
        let worker = DownloadWorker::new(
            7,
            "127.0.0.1:9000".parse().unwrap(),
            payload,
            3,
            4,
            rx,
            sink.clone(),
            1500,
        );

        let handle = std::thread::spawn(move || worker.run());

        // Let the worker burst out its initial window before closing.
        std::thread::sleep(Duration::from_millis(20));
        for id in 0..4u32 {
            tx.send(Packet::Ack {
                request_id: 7,
                segment_id: id,
            })
            .unwrap();
        }
        tx.send(Packet::DownloadCompleted { request_id: 7 }).unwrap();
        handle.join().unwrap();

        let sent = sink.sent.lock().unwrap();
        let segments: Vec<_> = sent
            .iter()
            .filter_map(|b| match Packet::decode(b.clone()).unwrap() {
                Packet::Segment { segment_id, .. } => Some(segment_id),
                _ => None,
            })
            .collect();
        assert!((0..4).all(|id| segments.contains(&id)));
        assert!(matches!(
            Packet::decode(sent.last().unwrap().clone()).unwrap(),
            Packet::Close { request_id: 7 }
        ));
    }
}
