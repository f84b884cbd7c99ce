//! Synthetic S/PDIF inputs
//!
//! A source stands in for a receiver on the board: it emits bursts of
//! [`RX_BURST`] frames at its own (slightly wrong) clock, measured against
//! the mixer's 48kHz output.

use std::f64::consts::TAU;

use spdif_core::{RawFrame, FULL_SCALE_24, OUTPUT_SAMPLE_RATE, RX_BURST};

/// Sine tone paced by a skewed sample clock
pub struct ToneSource {
    /// Bursts owed per output frame (0 = unplugged)
    bursts_per_frame: f64,
    /// Fractional bursts accumulated and not yet emitted
    credit: f64,
    /// Tone phase advance per input frame, in cycles
    tone_step: f64,
    tone_phase: f64,
    amplitude: f64,
}

impl ToneSource {
    /// `rate_hz` of 0 builds a source that never produces anything
    pub fn new(rate_hz: u32, ppm: f64, tone_hz: f64, amplitude: f64) -> Self {
        let actual_hz = rate_hz as f64 * (1.0 + ppm * 1e-6);
        let tone_step = if rate_hz == 0 { 0.0 } else { tone_hz / rate_hz as f64 };
        Self {
            bursts_per_frame: actual_hz / (OUTPUT_SAMPLE_RATE as f64 * RX_BURST as f64),
            credit: 0.0,
            tone_step,
            tone_phase: 0.0,
            amplitude,
        }
    }

    pub fn is_plugged(&self) -> bool {
        self.bursts_per_frame > 0.0
    }

    /// Let `frames` output frames pass; returns how many bursts arrived
    pub fn advance(&mut self, frames: usize) -> usize {
        self.credit += self.bursts_per_frame * frames as f64;
        let due = self.credit.floor();
        self.credit -= due;
        due as usize
    }

    /// Produce the next burst of the tone (same signal on both sides, right inverted)
    pub fn next_burst(&mut self) -> [RawFrame; RX_BURST] {
        std::array::from_fn(|_| {
            let value = (self.tone_phase * TAU).sin() * self.amplitude * FULL_SCALE_24 as f64;
            self.tone_phase = (self.tone_phase + self.tone_step).fract();
            let v = value as i32;
            [v, -v]
        })
    }
}
