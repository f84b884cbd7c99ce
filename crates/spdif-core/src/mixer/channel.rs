//! Per-input mixer state

use crate::config::DriftConfig;
use crate::ring::InterpolatingRing;
use crate::types::{ChannelId, RawFrame, Sample, SampleRate, StereoSample};

use super::drift::DriftTracker;

/// What a detection window did to a channel (for logging)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// Still unlocked, or still locked at the same rate
    Unchanged,
    /// A different rate matched but has not been confirmed yet
    Pending(SampleRate),
    /// Locked onto a new rate; all timing state was restarted
    Locked(SampleRate),
    /// Count matched no rate while locked
    Lost,
}

/// Everything the mixer keeps for one input
pub struct ChannelState {
    id: ChannelId,
    ring: InterpolatingRing,
    rate: SampleRate,
    drift: DriftTracker,
    /// Frames pushed since the last detection window
    input_count: u32,
    /// Frames pulled since lock (minus rebased intervals)
    output_date: f64,
    gain: Sample,
    /// Rate seen in the last window(s) but not yet trusted
    candidate: SampleRate,
    candidate_windows: u32,
    /// Head-to-read distance measured on the last pulled frame
    last_age: f64,
}

impl ChannelState {
    pub fn new(id: ChannelId, gain: Sample) -> Self {
        Self {
            id,
            ring: InterpolatingRing::new(),
            rate: SampleRate::NoSync,
            drift: DriftTracker::new(),
            input_count: 0,
            output_date: 0.0,
            gain,
            candidate: SampleRate::NoSync,
            candidate_windows: 0,
            last_age: 0.0,
        }
    }

    #[inline]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    #[inline]
    pub fn sample_rate(&self) -> SampleRate {
        self.rate
    }

    #[inline]
    pub fn drift_factor(&self) -> f64 {
        self.drift.factor()
    }

    #[inline]
    pub fn nominal_factor(&self) -> f64 {
        self.drift.nominal()
    }

    #[inline]
    pub fn ring_date(&self) -> f64 {
        self.ring.date()
    }

    #[inline]
    pub fn output_date(&self) -> f64 {
        self.output_date
    }

    #[inline]
    pub fn input_count(&self) -> u32 {
        self.input_count
    }

    #[inline]
    pub fn gain(&self) -> Sample {
        self.gain
    }

    #[inline]
    pub fn set_gain(&mut self, gain: Sample) {
        self.gain = gain;
    }

    /// Buffer age seen by the most recent read (0 when unlocked)
    #[inline]
    pub fn buffer_age(&self) -> f64 {
        self.last_age
    }

    /// Append one burst of raw frames
    #[inline]
    pub fn push(&mut self, frames: &[RawFrame]) {
        for &frame in frames {
            self.ring.push(frame);
        }
        self.input_count = self.input_count.saturating_add(frames.len() as u32);
    }

    /// Drop sync: ring date, output date and drift factor go to zero together
    pub fn enter_no_sync(&mut self) {
        self.rate = SampleRate::NoSync;
        self.drift.reset();
        self.ring.clear();
        self.output_date = 0.0;
        self.last_age = 0.0;
    }

    /// Lock onto `rate`, discarding all previous timing history
    pub fn lock(&mut self, rate: SampleRate) {
        self.rate = rate;
        self.drift.lock(rate.nominal_factor());
        self.ring.clear();
        self.output_date = 0.0;
        self.last_age = 0.0;
    }

    /// Close a detection window with the rate its input count matched
    pub fn end_window(&mut self, detected: SampleRate, lock_windows: u32) -> WindowOutcome {
        self.input_count = 0;

        if detected == self.rate {
            self.candidate = SampleRate::NoSync;
            self.candidate_windows = 0;
            return WindowOutcome::Unchanged;
        }

        if !detected.is_synced() {
            // Dropping sync never waits for confirmation
            self.candidate = SampleRate::NoSync;
            self.candidate_windows = 0;
            self.enter_no_sync();
            return WindowOutcome::Lost;
        }

        if detected == self.candidate {
            self.candidate_windows += 1;
        } else {
            self.candidate = detected;
            self.candidate_windows = 1;
        }

        if self.candidate_windows >= lock_windows {
            self.candidate = SampleRate::NoSync;
            self.candidate_windows = 0;
            self.lock(detected);
            WindowOutcome::Locked(detected)
        } else {
            WindowOutcome::Pending(detected)
        }
    }

    /// Produce this channel's contribution to one output frame
    ///
    /// Advances the output date whether or not the channel is locked.
    #[inline]
    pub fn render(&mut self, config: &DriftConfig) -> StereoSample {
        if !self.drift.is_locked() {
            self.output_date += 1.0;
            return StereoSample::silence();
        }

        self.drift.rebase(&mut self.output_date, config);
        let read = self.drift.read_date(self.output_date, config);
        let sample = self.ring.pull(read).scale(self.gain);

        self.last_age = self.ring.date() - read;
        self.drift.adjust(self.last_age, config);
        self.output_date += 1.0;

        sample
    }
}
