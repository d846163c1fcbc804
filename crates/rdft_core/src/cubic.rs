//! See [`CongestionWindow`].

use std::time::Duration;

use rdft_proto::{CUBIC_B, CUBIC_C};

/// Tracks the sender-side congestion window for one download, using a
/// CUBIC-like growth function on success and a multiplicative backoff on
/// loss.
///
/// Mirrors the shape of a classic RTT estimator (smoothed sample in, current
/// estimate out) but for window size rather than latency: [`Self::refresh`]
/// is called once per streaming cycle with "did everything in flight get
/// ACKed" and the elapsed wall-clock RTT for that cycle, and updates
/// [`Self::cwnd`] accordingly.
#[derive(Debug, Clone)]
pub struct CongestionWindow {
    cwnd: u32,
    cwnd_max: u32,
    /// Wall-clock time elapsed since the last backoff, accumulated across
    /// refresh cycles. This is `t` in the CUBIC growth function; a single
    /// cycle's RTT only tells you how long that one cycle took, so without
    /// accumulating, a run of same-length cycles would compute the same
    /// delta forever instead of climbing back toward `cwnd_max`.
    time_since_loss: Duration,
}

impl CongestionWindow {
    /// Starts a new window at `start` segments.
    #[must_use]
    pub const fn new(start: u32) -> Self {
        Self {
            cwnd: start.max(1),
            cwnd_max: start.max(1),
            time_since_loss: Duration::ZERO,
        }
    }

    /// The current window size, in segments. Always at least 1.
    #[must_use]
    pub const fn cwnd(&self) -> u32 {
        self.cwnd
    }

    /// Applies one refresh-cycle outcome.
    ///
    /// `fully_acked` is whether every segment sent in this cycle was ACKed by
    /// its end; `rtt` is the wall-clock span of the cycle.
    pub fn refresh(&mut self, fully_acked: bool, rtt: Duration) {
        if fully_acked {
            self.time_since_loss += rtt;
            self.grow();
        } else {
            self.back_off();
        }
    }

    fn back_off(&mut self) {
        self.cwnd_max = self.cwnd;
        self.cwnd = (self.cwnd / 2).max(1);
        self.time_since_loss = Duration::ZERO;
    }

    fn grow(&mut self) {
        let t = self.time_since_loss.as_secs_f64();
        let k = ((f64::from(self.cwnd_max) * (1.0 - CUBIC_B)) / CUBIC_C).cbrt();
        let radicand = t - k;
        // The cube of a negative radicand is itself negative and well
        // defined, but we only ever want it to pull cwnd below cwnd_max
        // when `t < k`, never to blow the update up; clamp to 0 so a still
        // very small elapsed time just means "no growth yet" rather than a
        // negative delta.
        let delta = CUBIC_C * radicand.max(0.0).powi(3);
        let grown = delta.round() as i64 + i64::from(self.cwnd_max);
        self.cwnd = u32::try_from(grown.max(1)).unwrap_or(u32::MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_drops_below_one() {
        let mut w = CongestionWindow::new(1);
        w.refresh(false, Duration::from_millis(50));
        assert_eq!(w.cwnd(), 1);
    }

    #[test]
    fn halves_on_loss_and_records_cwnd_max() {
        let mut w = CongestionWindow::new(100);
        w.refresh(false, Duration::from_millis(50));
        assert_eq!(w.cwnd(), 50);
    }

    #[test]
    fn grows_back_toward_cwnd_max_after_loss() {
        let mut w = CongestionWindow::new(1000);
        w.refresh(false, Duration::from_millis(50));
        assert_eq!(w.cwnd(), 500);

        let mut prev = w.cwnd();
        for _ in 0..20 {
            w.refresh(true, Duration::from_millis(50));
            assert!(w.cwnd() >= prev, "cwnd should grow monotonically toward cwnd_max");
            prev = w.cwnd();
        }
    }
}
