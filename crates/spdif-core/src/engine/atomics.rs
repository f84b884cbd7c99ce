//! Lock-free mixer status for the control side
//!
//! The audio thread stores after every processed block; readers (status
//! LEDs, logging, UI) load with `Ordering::Relaxed`. Values are independent
//! snapshots, there is no cross-field consistency.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::types::{SampleRate, NUM_CHANNELS};

/// Status of one input
#[derive(Debug, Default)]
pub struct ChannelAtomics {
    /// Detected rate in Hz, 0 = no sync
    pub sample_rate: AtomicU32,
    /// Drift factor as `f64` bits
    pub drift_bits: AtomicU64,
    /// Buffer age (frames) as `f64` bits
    pub age_bits: AtomicU64,
    /// Input frames discarded because the queue was full
    pub dropped_frames: AtomicU64,
}

impl ChannelAtomics {
    #[inline]
    pub fn sample_rate(&self) -> SampleRate {
        SampleRate::from_hz(self.sample_rate.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn drift_factor(&self) -> f64 {
        f64::from_bits(self.drift_bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn buffer_age(&self) -> f64 {
        f64::from_bits(self.age_bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub(crate) fn store(&self, rate: SampleRate, drift: f64, age: f64) {
        self.sample_rate
            .store(rate.hz().unwrap_or(0), Ordering::Relaxed);
        self.drift_bits.store(drift.to_bits(), Ordering::Relaxed);
        self.age_bits.store(age.to_bits(), Ordering::Relaxed);
    }
}

/// Status of the whole mixer
#[derive(Debug, Default)]
pub struct MixerAtomics {
    pub channels: [ChannelAtomics; NUM_CHANNELS],
    /// Output frames produced since start
    pub frames_out: AtomicU64,
}

impl MixerAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn frames_out(&self) -> u64 {
        self.frames_out.load(Ordering::Relaxed)
    }

    /// Detected rates of all inputs
    pub fn sample_rates(&self) -> [SampleRate; NUM_CHANNELS] {
        std::array::from_fn(|i| self.channels[i].sample_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_read_as_unsynced() {
        let atomics = MixerAtomics::new();
        assert_eq!(atomics.sample_rates(), [SampleRate::NoSync; NUM_CHANNELS]);
        assert_eq!(atomics.channels[0].drift_factor(), 0.0);
        assert_eq!(atomics.frames_out(), 0);
    }

    #[test]
    fn test_store_and_load() {
        let atomics = MixerAtomics::new();
        atomics.channels[1].store(SampleRate::Sr44100, 0.918_75, 20.25);
        assert_eq!(atomics.channels[1].sample_rate(), SampleRate::Sr44100);
        assert_eq!(atomics.channels[1].drift_factor(), 0.918_75);
        assert_eq!(atomics.channels[1].buffer_age(), 20.25);
    }
}
