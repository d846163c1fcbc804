//! A thread-safe, send-only view of a [`rdft_net::Transport`], used by
//! download workers running off the dispatcher thread.
//!
//! The dispatcher keeps exclusive, mutable access to the transport for
//! `recv_from` (see [`crate::registry::Registry`]); workers only ever need
//! to send, so they share a [`PacketSink`] instead of fighting the
//! dispatcher for the transport itself.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use rdft_net::Transport;

use crate::error::RdftError;

/// Send-only capability shared between the dispatcher and download workers.
pub trait PacketSink: Send + Sync {
    /// Sends `bytes` to `addr`.
    fn send(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), RdftError>;
}

/// A [`PacketSink`] backed by a mutex-guarded [`Transport`].
///
/// Contention is not a concern here: a send is a single non-blocking socket
/// call, so workers only ever hold the lock for the duration of that call.
pub struct SharedTransportSink {
    transport: Arc<Mutex<dyn Transport + Send>>,
}

impl SharedTransportSink {
    /// Wraps `transport` for sharing between the dispatcher and workers.
    #[must_use]
    pub fn new(transport: Arc<Mutex<dyn Transport + Send>>) -> Self {
        Self { transport }
    }
}

impl PacketSink for SharedTransportSink {
    fn send(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), RdftError> {
        let mut transport = self.transport.lock().expect("transport mutex poisoned");
        transport.send_to(bytes, addr)?;
        Ok(())
    }
}
