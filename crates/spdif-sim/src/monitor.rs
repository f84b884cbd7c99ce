//! Once-a-second status line: rates, drift, mix peak and the front-panel LEDs

use spdif_core::engine::MixerAtomics;
use spdif_core::status::{StatusBlinker, STATUS_TICK_MS};
use spdif_core::{ChannelId, RawFrame, Sample, StereoSample, NUM_CHANNELS, OUTPUT_SAMPLE_RATE};

/// Output frames between two LED steps
const FRAMES_PER_TICK: usize = (OUTPUT_SAMPLE_RATE * STATUS_TICK_MS / 1000) as usize;

#[derive(Debug, Default)]
pub struct StatusMonitor {
    blinker: StatusBlinker,
    leds: [bool; NUM_CHANNELS],
    frames_since_tick: usize,
    /// Loudest sample since the last log line, `None` if the mix was not seen
    peak: Option<Sample>,
}

impl StatusMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `frames` output frames of simulated time
    pub fn advance(&mut self, frames: usize, atomics: &MixerAtomics) {
        self.frames_since_tick += frames;
        while self.frames_since_tick >= FRAMES_PER_TICK {
            self.frames_since_tick -= FRAMES_PER_TICK;
            self.leds = self.blinker.tick(atomics.sample_rates());
        }
    }

    /// Track the loudest sample of a block of mixed output
    pub fn observe(&mut self, out: &[RawFrame]) {
        let block = out
            .iter()
            .map(|&frame| StereoSample::from_raw(frame).peak())
            .fold(0.0, Sample::max);
        self.peak = Some(self.peak.map_or(block, |p| p.max(block)));
    }

    pub fn leds(&self) -> [bool; NUM_CHANNELS] {
        self.leds
    }

    /// Peak since the previous call in dBFS, then start over
    pub fn take_peak_dbfs(&mut self) -> Option<Sample> {
        self.peak.take().map(|p| 20.0 * p.log10())
    }

    pub fn log(&mut self, second: usize, atomics: &MixerAtomics) {
        let status: Vec<String> = ChannelId::ALL
            .into_iter()
            .map(|channel| {
                let ch = &atomics.channels[channel.index()];
                format!(
                    "{} {} x{:.6} age {:.1}",
                    channel,
                    ch.sample_rate(),
                    ch.drift_factor(),
                    ch.buffer_age()
                )
            })
            .collect();
        let peak = match self.take_peak_dbfs() {
            Some(db) => format!(" | peak {:.1} dBFS", db),
            None => String::new(),
        };
        log::info!(
            "[SIM] t={}s | {} | leds {}{}",
            second,
            status.join(" | "),
            led_pattern(self.leds),
            peak
        );
    }
}

/// `*` for a lit LED, `.` for a dark one, IN1 first
fn led_pattern(leds: [bool; NUM_CHANNELS]) -> String {
    leds.iter().map(|&lit| if lit { '*' } else { '.' }).collect()
}
