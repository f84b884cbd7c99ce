//! Drift factor tracking
//!
//! The detected rate only gives the nominal ratio between an input and the
//! 48kHz output. The real clocks never match exactly, so the tracker keeps
//! the read point a fixed distance behind the write head by continuously
//! nudging the factor:
//!
//! ```text
//! read   = origin + output_date × factor − latency
//! age    = ring_date − read
//! target = latency
//! corr   = nominal × (1 + (age − target) / target × gain)   clamped to nominal × (1 ± clamp)
//! factor = factor + smoothing × (corr − factor)             every output frame
//! ```
//!
//! `output_date` grows without bound while a channel stays locked, which
//! would make every small factor update swing the read point further. Once it
//! reaches two rebase intervals, one interval is folded into `origin`; the
//! read date is the same before and after.

use crate::config::DriftConfig;

/// Per-channel drift state
#[derive(Debug, Clone, Default)]
pub struct DriftTracker {
    /// Ratio implied by the detected rate
    nominal: f64,
    /// Filtered ratio actually used to advance the read point; 0 = not locked
    factor: f64,
    /// Read date accumulated by earlier rebases
    origin: f64,
}

impl DriftTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking from scratch at a freshly detected nominal ratio
    pub fn lock(&mut self, nominal: f64) {
        self.nominal = nominal;
        self.factor = nominal;
        self.origin = 0.0;
    }

    /// Forget everything (channel lost sync)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    #[inline]
    pub fn nominal(&self) -> f64 {
        self.nominal
    }

    #[inline]
    pub fn origin(&self) -> f64 {
        self.origin
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.factor != 0.0
    }

    /// Fold one rebase interval of `output_date` into the origin when due
    #[inline]
    pub fn rebase(&mut self, output_date: &mut f64, config: &DriftConfig) {
        let interval = config.rebase_interval as f64;
        if *output_date >= 2.0 * interval {
            self.origin += interval * self.factor;
            *output_date -= interval;
        }
    }

    /// Ring date to read for the given output date
    #[inline]
    pub fn read_date(&self, output_date: f64, config: &DriftConfig) -> f64 {
        self.origin + output_date * self.factor - config.latency_frames
    }

    /// Blend one proportional correction into the factor
    ///
    /// `age` is the distance between the ring head and the read date that
    /// was just used.
    #[inline]
    pub fn adjust(&mut self, age: f64, config: &DriftConfig) {
        let target = config.latency_frames;
        let error = (age - target) / target;
        let correction = (self.nominal * (1.0 + error * config.correction_gain)).clamp(
            self.nominal * (1.0 - config.clamp),
            self.nominal * (1.0 + config.clamp),
        );
        self.factor += config.smoothing * (correction - self.factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_and_reset() {
        let mut drift = DriftTracker::new();
        assert!(!drift.is_locked());

        drift.lock(0.91875);
        assert!(drift.is_locked());
        assert_eq!(drift.factor(), 0.91875);
        assert_eq!(drift.nominal(), 0.91875);

        drift.reset();
        assert_eq!(drift.factor(), 0.0);
        assert_eq!(drift.nominal(), 0.0);
        assert_eq!(drift.origin(), 0.0);
    }

    #[test]
    fn test_on_target_age_keeps_factor() {
        let config = DriftConfig::default();
        let mut drift = DriftTracker::new();
        drift.lock(2.0);
        for _ in 0..1000 {
            drift.adjust(config.latency_frames, &config);
        }
        assert_eq!(drift.factor(), 2.0);
    }

    #[test]
    fn test_growing_age_speeds_up_reading() {
        let config = DriftConfig::default();
        let mut drift = DriftTracker::new();
        drift.lock(1.0);
        drift.adjust(config.latency_frames * 2.0, &config);
        assert!(drift.factor() > 1.0, "older data means read faster");

        drift.lock(1.0);
        drift.adjust(config.latency_frames * 0.5, &config);
        assert!(drift.factor() < 1.0, "fresh data means read slower");
    }

    #[test]
    fn test_correction_clamped_to_half_nominal() {
        let config = DriftConfig {
            smoothing: 1.0,
            correction_gain: 1000.0,
            ..Default::default()
        };
        let mut drift = DriftTracker::new();
        drift.lock(1.0);
        drift.adjust(1e6, &config);
        assert_eq!(drift.factor(), 1.5);
        drift.adjust(-1e6, &config);
        assert_eq!(drift.factor(), 0.5);
    }

    #[test]
    fn test_rebase_keeps_read_date_continuous() {
        let config = DriftConfig {
            rebase_interval: 100,
            ..Default::default()
        };
        let mut drift = DriftTracker::new();
        drift.lock(1.0015);

        let mut output_date = 199.0;
        drift.rebase(&mut output_date, &config);
        assert_eq!(output_date, 199.0, "not due yet");

        output_date = 200.0;
        let before = drift.read_date(output_date, &config);
        drift.rebase(&mut output_date, &config);
        let after = drift.read_date(output_date, &config);
        assert_eq!(output_date, 100.0);
        assert!((before - after).abs() < 1e-9, "{} vs {}", before, after);
        assert!((drift.origin() - 100.15).abs() < 1e-9);
    }
}
