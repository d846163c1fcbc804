use std::path::PathBuf;
use std::time::Duration;

/// Server-wide tunables, loaded by `rdft_server` in increasing precedence:
/// built-in defaults (this `Default` impl) → `.env` file → process
/// environment → CLI flags. `rdft_core` itself only ever sees the resolved
/// `Config`, never environment variables directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding `data.json`, `public/`, and `private/<id>/`.
    pub storage_path: PathBuf,
    /// Smallest `single_segment_size` the server will negotiate.
    pub single_segment_size_min: u32,
    /// Largest `single_segment_size` the server will negotiate.
    pub single_segment_size_max: u32,
    /// Soft per-`recv` timeout.
    pub socket_timeout: Duration,
    /// Largest datagram either peer will ever send or accept.
    pub socket_maxsize: usize,
    /// Initial congestion window, in segments.
    pub cwnd_start: u32,
    /// Number of OS threads in the download worker pool.
    pub worker_pool_size: usize,
    /// Longest path the server will accept in any request.
    pub file_path_max_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("storage"),
            single_segment_size_min: rdft_proto::SINGLE_SEGMENT_SIZE_MIN,
            single_segment_size_max: rdft_proto::SINGLE_SEGMENT_SIZE_MAX,
            socket_timeout: Duration::from_millis(rdft_proto::SOCKET_TIMEOUT_MS),
            socket_maxsize: rdft_proto::SOCKET_MAXSIZE,
            cwnd_start: rdft_proto::CWND_START,
            worker_pool_size: 2,
            file_path_max_length: 256,
        }
    }
}

impl Config {
    /// Clamps a client-proposed `single_segment_size` into the configured
    /// range, per §3's invariant on `single_segment_size`.
    #[must_use]
    pub fn clamp_segment_size(&self, proposed: u32) -> u32 {
        proposed.clamp(self.single_segment_size_min, self.single_segment_size_max)
    }
}
