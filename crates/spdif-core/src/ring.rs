//! Interpolating ring buffer
//!
//! Each input writes its frames here at its own pace. The ring keeps a
//! logical date that advances by one per written frame, so the mixer can ask
//! for any point in the last [`RING_CAPACITY`] frames, fractional positions
//! included, and get a linearly interpolated frame back.
//!
//! Dates follow the write order: the first frame written after a clear sits
//! at date 0, the k-th at date k-1, and [`InterpolatingRing::date`] is the
//! number of frames written so far.

use crate::types::{RawFrame, Sample, StereoSample, RING_CAPACITY};

/// Fixed-capacity circular store of normalized stereo frames
pub struct InterpolatingRing {
    samples: [StereoSample; RING_CAPACITY],
    /// Slot the next frame goes into
    cursor: usize,
    /// Frames written since the last clear
    date: f64,
}

impl InterpolatingRing {
    /// Create an empty ring (date 0, all slots silent)
    pub fn new() -> Self {
        Self {
            samples: [StereoSample::silence(); RING_CAPACITY],
            cursor: 0,
            date: 0.0,
        }
    }

    /// Current head date
    #[inline]
    pub fn date(&self) -> f64 {
        self.date
    }

    /// Number of frames the ring can look back over
    #[inline]
    pub fn capacity(&self) -> usize {
        RING_CAPACITY
    }

    /// Normalize a raw 24-bit frame and append it
    #[inline]
    pub fn push(&mut self, raw: RawFrame) {
        self.push_sample(StereoSample::from_raw(raw));
    }

    /// Append an already normalized frame
    #[inline]
    pub fn push_sample(&mut self, sample: StereoSample) {
        self.samples[self.cursor] = sample;
        self.cursor += 1;
        if self.cursor == RING_CAPACITY {
            self.cursor = 0;
        }
        self.date += 1.0;
    }

    /// Read the frame at `date`, interpolating between neighbours
    ///
    /// Returns silence when the ring is empty, when `date` lies in the future
    /// or when it is older than the ring can hold. Between the newest frame
    /// and the head date the newest frame is held.
    pub fn pull(&self, date: f64) -> StereoSample {
        if self.date == 0.0
            || !date.is_finite()
            || date > self.date
            || date + (RING_CAPACITY as f64) < self.date
        {
            return StereoSample::silence();
        }

        let newest = self.date - 1.0;
        let floor = date.floor();
        if floor >= newest {
            return self.sample_at(newest);
        }

        let frac = (date - floor) as Sample;
        let lower = self.sample_at(floor);
        let upper = self.sample_at(floor + 1.0);
        lower.lerp(&upper, frac)
    }

    /// Stored frame at an integer date inside the readable span
    #[inline]
    fn sample_at(&self, date: f64) -> StereoSample {
        // 1 = newest frame, RING_CAPACITY = oldest
        let back = (self.date - date) as usize;
        let idx = (self.cursor + RING_CAPACITY - back) % RING_CAPACITY;
        self.samples[idx]
    }

    /// Rewind to date 0 and fill with silence
    pub fn clear(&mut self) {
        self.samples.fill(StereoSample::silence());
        self.cursor = 0;
        self.date = 0.0;
    }
}

impl Default for InterpolatingRing {
    fn default() -> Self {
        Self::new()
    }
}
