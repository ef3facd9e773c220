//! Telemetry rate monitor.
//!
//! Rates are computed from frame timestamps, not from a fixed period: the
//! controller's publishing rate is nominal only.

use serde::Serialize;
use tracing::{debug, warn};

/// Inter-arrival statistics since the link came up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RateStats {
    pub frames: u64,
    /// Last inter-frame delta [s].
    pub last_delta: Option<f64>,
    pub min_delta: Option<f64>,
    pub max_delta: Option<f64>,
    pub mean_delta: Option<f64>,
    /// Frames later than twice the nominal period.
    pub late: u64,
    /// Frames whose timestamp did not increase (duplicate or out of order).
    pub non_increasing: u64,
}

impl RateStats {
    /// Measured rate [Hz] from the mean delta.
    pub fn mean_rate_hz(&self) -> Option<f64> {
        self.mean_delta.filter(|d| *d > 0.0).map(|d| 1.0 / d)
    }
}

#[derive(Debug, Clone)]
pub struct RateMonitor {
    nominal_period: f64,
    last_timestamp: Option<f64>,
    sum: f64,
    counted: u64,
    stats: RateStats,
}

impl RateMonitor {
    /// `nominal_period` [s] is only used to classify late frames.
    pub fn new(nominal_period: f64) -> Self {
        Self {
            nominal_period,
            last_timestamp: None,
            sum: 0.0,
            counted: 0,
            stats: RateStats::default(),
        }
    }

    #[inline]
    pub fn stats(&self) -> RateStats {
        self.stats
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.nominal_period);
    }

    /// Record one frame; returns the delta to the previous frame.
    pub fn record(&mut self, timestamp: f64) -> Option<f64> {
        self.stats.frames += 1;
        let Some(last) = self.last_timestamp else {
            self.last_timestamp = Some(timestamp);
            return None;
        };

        let delta = timestamp - last;
        if delta <= 0.0 {
            // Arrival order stays authoritative; the delta is not averaged.
            self.stats.non_increasing += 1;
            debug!(delta, "non-increasing telemetry timestamp");
            self.stats.last_delta = Some(delta);
            return Some(delta);
        }
        self.last_timestamp = Some(timestamp);

        if delta > 2.0 * self.nominal_period {
            self.stats.late += 1;
            warn!(
                delta,
                nominal = self.nominal_period,
                "late telemetry frame"
            );
        }

        self.counted += 1;
        self.sum += delta;
        self.stats.last_delta = Some(delta);
        self.stats.min_delta = Some(self.stats.min_delta.map_or(delta, |m| m.min(delta)));
        self.stats.max_delta = Some(self.stats.max_delta.map_or(delta, |m| m.max(delta)));
        self.stats.mean_delta = Some(self.sum / self.counted as f64);
        Some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_has_no_delta() {
        let mut mon = RateMonitor::new(0.05);
        assert_eq!(mon.record(100.0), None);
        assert_eq!(mon.stats().frames, 1);
        assert_eq!(mon.stats().mean_delta, None);
    }

    #[test]
    fn statistics_follow_timestamps() {
        let mut mon = RateMonitor::new(0.05);
        for t in [0.0, 0.05, 0.15, 0.20] {
            mon.record(t);
        }
        let stats = mon.stats();
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.late, 0);
        assert!((stats.min_delta.unwrap() - 0.05).abs() < 1e-9);
        assert!((stats.max_delta.unwrap() - 0.10).abs() < 1e-9);
        assert!((stats.mean_delta.unwrap() - 0.2 / 3.0).abs() < 1e-9);
        assert!((stats.mean_rate_hz().unwrap() - 15.0).abs() < 1e-6);
    }

    #[test]
    fn late_and_out_of_order_frames_are_counted() {
        let mut mon = RateMonitor::new(0.05);
        mon.record(1.0);
        mon.record(1.2);
        mon.record(1.1);
        mon.record(1.2);
        let stats = mon.stats();
        assert_eq!(stats.late, 1);
        assert_eq!(stats.non_increasing, 2);
        // The stale frames did not move the reference timestamp back.
        assert_eq!(mon.record(1.25).map(|d| (d * 100.0).round()), Some(5.0));
    }
}
