//! Headline wire-format constants (§6.1).

/// Smallest `single_segment_size` the server will negotiate.
pub const SINGLE_SEGMENT_SIZE_MIN: u32 = 10;
/// Largest `single_segment_size` the server will negotiate.
pub const SINGLE_SEGMENT_SIZE_MAX: u32 = 1500;
/// Initial congestion window, in segments.
pub const CWND_START: u32 = 1500;
/// Soft per-`recv` timeout.
pub const SOCKET_TIMEOUT_MS: u64 = 100;
/// Largest datagram either peer will ever send or accept.
pub const SOCKET_MAXSIZE: usize = 64_000;
/// CUBIC scaling constant.
pub const CUBIC_C: f64 = 0.4;
/// CUBIC multiplicative-decrease factor.
pub const CUBIC_B: f64 = 0.7;

/// `request_id` reserved for unsolicited control packets (never assigned to a handler).
pub const UNSOLICITED_REQUEST_ID: u32 = 0;
