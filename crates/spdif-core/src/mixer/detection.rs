//! Sample-rate detection
//!
//! Every detection window the mixer compares how many frames each input
//! delivered against the count each standard rate would have produced over
//! the same number of output frames. Input arrives in DMA bursts, so the
//! count jitters by up to one burst; the tolerance band absorbs that.

use crate::config::MixerConfig;
use crate::types::SampleRate;

/// Frames a source at `rate` delivers while `window` output frames go out
#[inline]
pub fn expected_count(window: u32, rate: SampleRate) -> u32 {
    (window as f64 * rate.nominal_factor()).round() as u32
}

/// Maps a per-window input count to the closest recognised rate
#[derive(Debug, Clone)]
pub struct RateDetector {
    /// Expected count per lockable rate, in [`SampleRate::LOCKABLE`] order
    expected: Vec<(SampleRate, u32)>,
    tolerance: u32,
}

impl RateDetector {
    /// Precompute the expected counts for this configuration
    ///
    /// Allocates; build it once alongside the mixer, never on the audio path.
    pub fn new(config: &MixerConfig) -> Self {
        let expected = config
            .lockable_rates()
            .map(|rate| (rate, expected_count(config.detection_window, rate)))
            .collect();
        Self {
            expected,
            tolerance: config.rate_tolerance,
        }
    }

    /// Classify one window's input count
    ///
    /// The band is inclusive: `expected ± tolerance` still matches. When two
    /// bands would both match the nearer expected count wins.
    pub fn classify(&self, count: u32) -> SampleRate {
        self.expected
            .iter()
            .map(|&(rate, expected)| (rate, count.abs_diff(expected)))
            .filter(|&(_, distance)| distance <= self.tolerance)
            .min_by_key(|&(_, distance)| distance)
            .map(|(rate, _)| rate)
            .unwrap_or(SampleRate::NoSync)
    }

    /// Expected count for `rate`, if the detector recognises it
    pub fn expected_for(&self, rate: SampleRate) -> Option<u32> {
        self.expected
            .iter()
            .find(|(r, _)| *r == rate)
            .map(|(_, count)| *count)
    }
}
