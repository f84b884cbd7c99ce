//! Front-panel sync indication
//!
//! One LED per input. A locked input keeps its LED lit. Unlocked inputs
//! flash briefly once per cycle, each at its own phase, so a panel with
//! nothing plugged in shows a slow chase IN3 → IN2 → IN1.

use crate::mixer::Mixer;
use crate::types::{ChannelId, SampleRate, NUM_CHANNELS};

/// Period of one blink step
pub const STATUS_TICK_MS: u32 = 200;

/// Steps in one chase cycle
const CYCLE_TICKS: u8 = 9;

/// Step at which each input's LED flashes while unlocked
const FLASH_PHASE: [u8; NUM_CHANNELS] = [6, 3, 0];

/// Drives the three sync LEDs from the detected rates
#[derive(Debug, Default)]
pub struct StatusBlinker {
    tick: u8,
}

impl StatusBlinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one step; returns whether each input's LED is lit
    pub fn tick(&mut self, rates: [SampleRate; NUM_CHANNELS]) -> [bool; NUM_CHANNELS] {
        let phase = self.tick;
        self.tick = (self.tick + 1) % CYCLE_TICKS;

        std::array::from_fn(|i| rates[i].is_synced() || FLASH_PHASE[i] == phase)
    }

    /// Convenience for [`tick`](Self::tick) straight from a mixer
    pub fn tick_mixer(&mut self, mixer: &Mixer) -> [bool; NUM_CHANNELS] {
        self.tick(ChannelId::ALL.map(|ch| mixer.sample_rate(ch)))
    }
}
