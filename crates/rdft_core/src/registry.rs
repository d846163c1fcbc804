//! Request registry and dispatch: the mapping from `request_id` to handler,
//! plus the pending-first-response cache described in §4.5.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use rdft_proto::{Packet, RequestOp, ResponseSub};
use tracing::{debug, debug_span, trace, warn};

use crate::auth::{AuthStore, Identity};
use crate::config::Config;
use crate::download::DownloadWorker;
use crate::error::RdftError;
use crate::list_codec;
use crate::sink::PacketSink;
use crate::storage::StorageRoot;
use crate::upload::{SegmentOutcome, UploadHandler};
use crate::workpool::WorkerPool;

struct PendingResponse {
    bytes: Bytes,
    client_addr: SocketAddr,
}

struct UploadContext {
    handler: UploadHandler,
    storage: StorageRoot,
    path: String,
}

/// A download/list whose Response has been sent but whose worker has not
/// been spawned yet; §4.3 spawns the worker only once the client confirms
/// readiness, so the payload waits here in the meantime.
struct PendingDownload {
    client_addr: SocketAddr,
    payload: Vec<u8>,
    single_segment_size: u32,
    segments_amount: u32,
}

enum HandlerState {
    Upload(UploadContext),
    /// Dispatching: the worker has not been spawned yet (see
    /// [`PendingDownload`]).
    PendingDownload(PendingDownload),
    /// Streaming: the download worker runs on the pool; the registry only
    /// keeps the mailbox it feeds.
    Download(flume::Sender<Packet>),
}

/// Owns every active request's state and dispatches inbound packets to it.
///
/// Lives entirely on the dispatcher thread: nothing here is shared except
/// through the [`PacketSink`] handed to download workers.
pub struct Registry {
    handlers: HashMap<u32, HandlerState>,
    pending: HashMap<u32, PendingResponse>,
    next_request_id: u32,
    config: Config,
    storage_public: StorageRoot,
    auth: AuthStore,
    pool: WorkerPool,
    sink: Arc<dyn PacketSink>,
}

impl Registry {
    /// Builds a registry rooted at `config.storage_path`.
    pub fn new(config: Config, sink: Arc<dyn PacketSink>) -> Result<Self, RdftError> {
        let storage_public = StorageRoot::open(
            config.storage_path.join("public"),
            config.file_path_max_length,
        )?;
        let auth = AuthStore::open(&config.storage_path)?;
        let pool = WorkerPool::new(config.worker_pool_size);

        Ok(Self {
            handlers: HashMap::new(),
            pending: HashMap::new(),
            next_request_id: 1,
            config,
            storage_public,
            auth,
            pool,
            sink,
        })
    }

    fn allocate_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }

    fn storage_for(&self, identity: &Identity) -> Result<StorageRoot, RdftError> {
        match identity {
            Identity::Anonymous => Ok(self.storage_public.clone()),
            Identity::User { id } => StorageRoot::open(
                self.config.storage_path.join("private").join(id),
                self.config.file_path_max_length,
            ),
        }
    }

    fn send(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(err) = self.sink.send(&packet.encode(), addr) {
            warn!(%err, %addr, "failed to send packet");
        }
    }

    /// Resends every pending first response except the one keyed by
    /// `incoming_request_id`, per §4.5 step 1.
    fn resend_pending(&self, incoming_request_id: u32) {
        for (request_id, pending) in &self.pending {
            if *request_id == incoming_request_id {
                continue;
            }
            trace!(request_id, "resending pending first response");
            if let Err(err) = self.sink.send(&pending.bytes, pending.client_addr) {
                warn!(%err, request_id, "failed to resend pending response");
            }
        }
    }

    /// Dispatches one inbound packet. `from` is the packet's source address.
    pub fn handle_packet(&mut self, packet: Packet, from: SocketAddr) {
        let request_id = packet.request_id();
        self.resend_pending(request_id);

        match packet {
            Packet::Request { .. } => self.handle_request(packet, from),
            Packet::ReadyForDownloading { request_id } => {
                self.handle_ready_for_downloading(request_id, from);
            }
            Packet::Segment {
                request_id,
                segment_id,
                payload,
            } => self.handle_upload_segment(request_id, segment_id, payload, from),
            Packet::Ack { .. } | Packet::DownloadCompleted { .. } => {
                self.forward_to_download(request_id, packet, from);
            }
            Packet::Close { .. } | Packet::Response { .. } => {
                debug!(request_id, "ignoring peer-originated control/response packet");
            }
        }
    }

    fn handle_request(&mut self, packet: Packet, from: SocketAddr) {
        let Packet::Request {
            data_size,
            max_segment_size,
            anonymous,
            user_name,
            password,
            op,
            ..
        } = packet
        else {
            unreachable!("caller guarantees a Request variant");
        };

        let request_id = self.allocate_request_id();
        let span = debug_span!("request", request_id);
        let _enter = span.enter();

        let identity = if anonymous {
            Ok(Identity::Anonymous)
        } else {
            self.auth.resolve(&user_name, &password)
        };

        let identity = match identity {
            Ok(identity) => identity,
            Err(err) => {
                self.send(&error_response(request_id, &err), from);
                return;
            }
        };

        let storage = match self.storage_for(&identity) {
            Ok(storage) => storage,
            Err(err) => {
                self.send(&error_response(request_id, &err), from);
                return;
            }
        };

        let single_segment_size = self.config.clamp_segment_size(max_segment_size.max(1));

        let result = match op {
            RequestOp::Upload { path } => {
                let result =
                    self.start_upload(request_id, storage, path, data_size, single_segment_size);
                if result.is_ok() {
                    let segments_amount = segments_amount_for(data_size, single_segment_size);
                    self.send(
                        &Packet::Response {
                            request_id,
                            ok: true,
                            error: String::new(),
                            data_size,
                            segments_amount,
                            single_segment_size,
                            sub: ResponseSub::None,
                        },
                        from,
                    );
                }
                result
            }
            RequestOp::Download { path } => {
                self.start_download(request_id, from, &storage, &path, single_segment_size)
            }
            RequestOp::List { path, recursive } => {
                self.start_list(request_id, from, &storage, &path, recursive, single_segment_size)
            }
            RequestOp::Delete { path } => self.handle_delete(request_id, from, &storage, &path),
        };

        if let Err(err) = result {
            self.send(&error_response(request_id, &err), from);
        }
    }

    fn start_upload(
        &mut self,
        request_id: u32,
        storage: StorageRoot,
        path: String,
        data_size: u32,
        single_segment_size: u32,
    ) -> Result<(), RdftError> {
        if path.is_empty() {
            return Err(RdftError::InvalidArgument("path empty".into()));
        }

        let segments_amount = segments_amount_for(data_size, single_segment_size);

        if segments_amount == 0 {
            // Empty upload: nothing to reassemble, materialize immediately.
            Registry::materialize_upload(&storage, &path, Vec::new())?;
        } else {
            self.handlers.insert(
                request_id,
                HandlerState::Upload(UploadContext {
                    handler: UploadHandler::new(segments_amount),
                    storage,
                    path,
                }),
            );
        }

        Ok(())
    }

    fn start_download(
        &mut self,
        request_id: u32,
        from: SocketAddr,
        storage: &StorageRoot,
        path: &str,
        single_segment_size: u32,
    ) -> Result<(), RdftError> {
        let (is_file, mut payload) = storage.read(path)?;
        let mut full = Vec::with_capacity(payload.len() + 1);
        full.push(u8::from(is_file));
        full.append(&mut payload);
        self.begin_streaming(request_id, from, full, single_segment_size)
    }

    fn start_list(
        &mut self,
        request_id: u32,
        from: SocketAddr,
        storage: &StorageRoot,
        path: &str,
        recursive: bool,
        single_segment_size: u32,
    ) -> Result<(), RdftError> {
        let entries = storage.list(path, recursive)?;
        let payload = list_codec::encode(&entries);
        self.begin_streaming(request_id, from, payload, single_segment_size)
    }

    fn begin_streaming(
        &mut self,
        request_id: u32,
        from: SocketAddr,
        payload: Vec<u8>,
        single_segment_size: u32,
    ) -> Result<(), RdftError> {
        let data_size = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        let segments_amount = segments_amount_for(data_size, single_segment_size);

        let response = Packet::Response {
            request_id,
            ok: true,
            error: String::new(),
            data_size,
            segments_amount,
            single_segment_size,
            sub: ResponseSub::None,
        };
        let encoded = response.encode();
        self.send(&response, from);
        self.pending.insert(
            request_id,
            PendingResponse {
                bytes: encoded,
                client_addr: from,
            },
        );

        // Dispatching: no worker yet. It is spawned in
        // `handle_ready_for_downloading` once the client confirms readiness
        // (§4.3) — an empty file/listing (`segments_amount == 0`) never
        // gets a `ReadyForDownloading` at all, so it must never tie up a
        // pool thread waiting on a `DownloadCompleted` that will never come.
        self.handlers.insert(
            request_id,
            HandlerState::PendingDownload(PendingDownload {
                client_addr: from,
                payload,
                single_segment_size,
                segments_amount,
            }),
        );
        Ok(())
    }

    fn handle_delete(
        &mut self,
        request_id: u32,
        from: SocketAddr,
        storage: &StorageRoot,
        path: &str,
    ) -> Result<(), RdftError> {
        let is_file = storage.delete(path)?;
        let response = Packet::Response {
            request_id,
            ok: true,
            error: String::new(),
            data_size: 0,
            segments_amount: 0,
            single_segment_size: 0,
            sub: ResponseSub::Delete { is_file },
        };
        self.send(&response, from);
        Ok(())
    }

    fn handle_ready_for_downloading(&mut self, request_id: u32, from: SocketAddr) {
        if self.pending.remove(&request_id).is_none() {
            debug!(request_id, %from, "ReadyForDownloading for unknown/expired request");
            self.send(&Packet::unsolicited_close(), from);
            return;
        }

        match self.handlers.remove(&request_id) {
            Some(HandlerState::PendingDownload(spec)) => {
                let (mailbox_tx, mailbox_rx) = flume::unbounded();
                self.handlers
                    .insert(request_id, HandlerState::Download(mailbox_tx));

                let worker = DownloadWorker::new(
                    request_id,
                    spec.client_addr,
                    spec.payload,
                    spec.single_segment_size,
                    spec.segments_amount,
                    mailbox_rx,
                    self.sink.clone(),
                    self.config.cwnd_start,
                );
                // The worker itself removes nothing from `self.handlers`; a
                // finished download just leaves its mailbox sender to be
                // dropped the next time this request_id's slot is reused,
                // which never happens since ids are never recycled.
                // Completed/gone handlers are harmless dead weight, not a
                // correctness issue.
                self.pool.submit(move || worker.run());
            }
            Some(other) => {
                // Not a Dispatching download (already streaming, or an
                // upload reusing the id is impossible since ids are never
                // recycled) — leave it alone.
                self.handlers.insert(request_id, other);
            }
            None => {
                debug!(request_id, %from, "ReadyForDownloading for a request with no handler");
            }
        }
    }

    fn handle_upload_segment(&mut self, request_id: u32, segment_id: u32, payload: Bytes, from: SocketAddr) {
        let Some(HandlerState::Upload(ctx)) = self.handlers.get_mut(&request_id) else {
            debug!(request_id, "Segment for unknown/non-upload request");
            self.send(&Packet::unsolicited_close(), from);
            return;
        };

        let ack = Packet::Ack {
            request_id,
            segment_id,
        };

        match ctx.handler.on_segment(segment_id, payload) {
            Ok(SegmentOutcome::Pending) => self.send(&ack, from),
            Ok(SegmentOutcome::Complete(reassembled)) => {
                self.send(&ack, from);
                self.send(&Packet::Close { request_id }, from);
                let HandlerState::Upload(ctx) = self.handlers.remove(&request_id).expect("checked above") else {
                    unreachable!("matched Upload above");
                };
                if let Err(err) = Registry::materialize_upload(&ctx.storage, &ctx.path, reassembled) {
                    warn!(request_id, %err, "failed to materialize completed upload");
                }
            }
            Err(RdftError::MalformedPacket(err)) => {
                // Dropped, not fatal: a stray/spoofed out-of-range segment_id
                // must not abort an otherwise-valid upload (§7).
                debug!(request_id, %err, "dropping malformed upload segment");
            }
            Err(err) => {
                warn!(request_id, %err, "rejecting upload");
                self.send(&error_response(request_id, &err), from);
                self.handlers.remove(&request_id);
            }
        }
    }

    fn forward_to_download(&mut self, request_id: u32, packet: Packet, from: SocketAddr) {
        match self.handlers.get(&request_id) {
            Some(HandlerState::Download(mailbox)) => {
                if mailbox.send(packet).is_err() {
                    debug!(request_id, "download worker mailbox closed");
                    self.handlers.remove(&request_id);
                }
            }
            _ => {
                debug!(request_id, "Ack/DownloadCompleted for unknown/non-download request");
                self.send(&Packet::unsolicited_close(), from);
            }
        }
    }

    /// Writes a completed upload's reassembled bytes to `path`. The leading
    /// byte of `payload` selects file vs. directory, same as a download's
    /// payload; a zero-length payload (empty upload) is always a file.
    fn materialize_upload(storage: &StorageRoot, path: &str, payload: Vec<u8>) -> Result<(), RdftError> {
        let (is_file, body) = match payload.split_first() {
            Some((&flag, rest)) => (flag != 0, rest.to_vec()),
            None => (true, Vec::new()),
        };
        storage.write(path, is_file, &body)
    }
}

fn segments_amount_for(data_size: u32, single_segment_size: u32) -> u32 {
    if data_size == 0 {
        0
    } else {
        data_size.div_ceil(single_segment_size)
    }
}

fn error_response(request_id: u32, err: &RdftError) -> Packet {
    Packet::Response {
        request_id,
        ok: false,
        error: err.to_string(),
        data_size: 0,
        segments_amount: 0,
        single_segment_size: 0,
        sub: ResponseSub::None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    struct RecordingSink {
        sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }

        fn packets(&self) -> Vec<Packet> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(bytes, _)| Packet::decode(bytes.clone()).expect("registry only sends valid packets"))
                .collect()
        }

        fn wait_for(&self, predicate: impl Fn(&Packet) -> bool) -> Packet {
            let deadline = std::time::Instant::now() + Duration::from_secs(2);
            loop {
                if let Some(found) = self.packets().into_iter().find(&predicate) {
                    return found;
                }
                assert!(std::time::Instant::now() < deadline, "timed out waiting for packet");
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    impl PacketSink for RecordingSink {
        fn send(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), RdftError> {
            self.sent.lock().unwrap().push((bytes.to_vec(), addr));
            Ok(())
        }
    }

    fn test_registry() -> (tempfile::TempDir, Arc<RecordingSink>, Registry) {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::new());
        let mut config = Config::default();
        config.storage_path = dir.path().to_path_buf();
        config.worker_pool_size = 2;
        let registry = Registry::new(config, sink.clone()).unwrap();
        (dir, sink, registry)
    }

    fn client_addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn empty_upload_materializes_a_zero_byte_file() {
        let (dir, sink, mut registry) = test_registry();
        registry.handle_packet(
            Packet::Request {
                request_id: 0,
                data_size: 0,
                max_segment_size: 1000,
                anonymous: true,
                user_name: String::new(),
                password: String::new(),
                op: RequestOp::Upload {
                    path: "empty.md".into(),
                },
            },
            client_addr(),
        );

        let response = sink.wait_for(|p| matches!(p, Packet::Response { .. }));
        let Packet::Response { ok, segments_amount, .. } = response else {
            unreachable!()
        };
        assert!(ok);
        assert_eq!(segments_amount, 0);
        assert_eq!(fs::metadata(dir.path().join("public/empty.md")).unwrap().len(), 0);
    }

    #[test]
    fn small_upload_reassembles_out_of_order_segments() {
        let (dir, sink, mut registry) = test_registry();
        let payload = b"abcdefghij0123456789"; // 20 bytes, comfortably above the min segment size
        registry.handle_packet(
            Packet::Request {
                request_id: 0,
                data_size: (payload.len() + 1) as u32,
                max_segment_size: 4,
                anonymous: true,
                user_name: String::new(),
                password: String::new(),
                op: RequestOp::Upload {
                    path: "letters.txt".into(),
                },
            },
            client_addr(),
        );
        let response = sink.wait_for(|p| matches!(p, Packet::Response { .. }));
        let Packet::Response {
            request_id,
            single_segment_size,
            segments_amount,
            ..
        } = response
        else {
            unreachable!()
        };

        // is_file=true prefix + payload, chunked at the server-negotiated size
        let mut framed = vec![1u8];
        framed.extend_from_slice(payload);
        let chunks: Vec<Bytes> = framed
            .chunks(single_segment_size as usize)
            .map(Bytes::copy_from_slice)
            .collect();
        assert_eq!(chunks.len() as u32, segments_amount);

        let mut order: Vec<u32> = (0..segments_amount).collect();
        order.reverse();
        for id in order {
            registry.handle_packet(
                Packet::Segment {
                    request_id,
                    segment_id: id,
                    payload: chunks[id as usize].clone(),
                },
                client_addr(),
            );
        }

        sink.wait_for(|p| matches!(p, Packet::Close { request_id: rid } if *rid == request_id));
        let written = fs::read(dir.path().join("public/letters.txt")).unwrap();
        assert_eq!(written, payload);
    }

    #[test]
    fn delete_reports_is_file_and_removes_target() {
        let (dir, sink, mut registry) = test_registry();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("public/x.txt"), b"x").unwrap();

        registry.handle_packet(
            Packet::Request {
                request_id: 0,
                data_size: 0,
                max_segment_size: 0,
                anonymous: true,
                user_name: String::new(),
                password: String::new(),
                op: RequestOp::Delete {
                    path: "x.txt".into(),
                },
            },
            client_addr(),
        );

        let response = sink.wait_for(|p| matches!(p, Packet::Response { .. }));
        let Packet::Response { ok, sub, .. } = response else {
            unreachable!()
        };
        assert!(ok);
        assert_eq!(sub, ResponseSub::Delete { is_file: true });
        assert!(!dir.path().join("public/x.txt").exists());
    }

    #[test]
    fn download_streams_segments_and_client_can_drive_it_to_completion() {
        let (dir, sink, mut registry) = test_registry();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("public/a.bin"), vec![7u8; 20]).unwrap();

        registry.handle_packet(
            Packet::Request {
                request_id: 0,
                data_size: 0,
                max_segment_size: 5,
                anonymous: true,
                user_name: String::new(),
                password: String::new(),
                op: RequestOp::Download {
                    path: "a.bin".into(),
                },
            },
            client_addr(),
        );

        let response = sink.wait_for(|p| matches!(p, Packet::Response { .. }));
        let Packet::Response {
            request_id,
            segments_amount,
            ..
        } = response
        else {
            unreachable!()
        };
        assert!(segments_amount > 0);

        registry.handle_packet(Packet::ReadyForDownloading { request_id }, client_addr());

        for id in 0..segments_amount {
            sink.wait_for(|p| matches!(p, Packet::Segment { segment_id, .. } if *segment_id == id));
            registry.handle_packet(
                Packet::Ack {
                    request_id,
                    segment_id: id,
                },
                client_addr(),
            );
        }
        registry.handle_packet(Packet::DownloadCompleted { request_id }, client_addr());

        sink.wait_for(|p| matches!(p, Packet::Close { request_id: rid } if *rid == request_id));
    }
}
