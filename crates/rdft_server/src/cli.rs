use std::path::PathBuf;

use clap::Parser;

/// Which transport the dispatcher binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportKind {
    Udp,
    Tcp,
}

/// RDFT server: dispatches requests and streams downloads.
#[derive(Debug, Parser)]
#[command(name = "rdft-server", version, about)]
pub struct Cli {
    /// Address to bind the listening socket to.
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the listening socket to.
    #[arg(long, env = "APP_PORT", default_value_t = 9696)]
    pub port: u16,

    /// Root directory for `data.json`, `public/`, and `private/<id>/`.
    #[arg(long, env = "APP_STORAGE_PATH", default_value = "storage")]
    pub storage_path: PathBuf,

    /// Transport to listen on.
    #[arg(long, value_enum, default_value_t = TransportKind::Udp)]
    pub transport: TransportKind,

    /// Smallest `single_segment_size` the server will negotiate.
    #[arg(long, env = "SINGLE_SEGMENT_SIZE_MIN")]
    pub single_segment_size_min: Option<u32>,

    /// Largest `single_segment_size` the server will negotiate.
    #[arg(long, env = "SINGLE_SEGMENT_SIZE_MAX")]
    pub single_segment_size_max: Option<u32>,

    /// Soft per-`recv` timeout, in milliseconds.
    #[arg(long, env = "SOCKET_TIMEOUT")]
    pub socket_timeout_ms: Option<u64>,

    /// Largest datagram either peer will ever send or accept.
    #[arg(long, env = "SOCKET_MAXSIZE")]
    pub socket_maxsize: Option<usize>,

    /// Initial congestion window, in segments.
    #[arg(long, env = "CWND_START")]
    pub cwnd_start: Option<u32>,

    /// Number of OS threads in the download worker pool.
    #[arg(long, env = "WORKER_POOL_SIZE")]
    pub worker_pool_size: Option<usize>,

    /// Longest path the server will accept in any request.
    #[arg(long, env = "FILE_PATH_MAX_LENGTH")]
    pub file_path_max_length: Option<usize>,
}

impl Cli {
    /// Folds CLI-provided overrides onto the built-in defaults.
    #[must_use]
    pub fn resolve_config(&self) -> rdft_core::Config {
        let defaults = rdft_core::Config::default();
        rdft_core::Config {
            storage_path: self.storage_path.clone(),
            single_segment_size_min: self
                .single_segment_size_min
                .unwrap_or(defaults.single_segment_size_min),
            single_segment_size_max: self
                .single_segment_size_max
                .unwrap_or(defaults.single_segment_size_max),
            socket_timeout: self
                .socket_timeout_ms
                .map_or(defaults.socket_timeout, std::time::Duration::from_millis),
            socket_maxsize: self.socket_maxsize.unwrap_or(defaults.socket_maxsize),
            cwnd_start: self.cwnd_start.unwrap_or(defaults.cwnd_start),
            worker_pool_size: self.worker_pool_size.unwrap_or(defaults.worker_pool_size),
            file_path_max_length: self
                .file_path_max_length
                .unwrap_or(defaults.file_path_max_length),
        }
    }
}
