//! Multi-stream mixer
//!
//! Three clock-asynchronous inputs go in, one 48kHz stereo stream comes out.
//!
//! # Architecture
//!
//! ```text
//!  IN1 ──push──► ring 1 ─┐
//!  IN2 ──push──► ring 2 ─┼──► read at origin + date × drift − latency ──► × gain ──► Σ ──► × master ──► 24-bit
//!  IN3 ──push──► ring 3 ─┘
//! ```
//!
//! - **Push** (input DMA callback): frames go straight into the channel's
//!   ring and are counted for rate detection.
//! - **Pull** (output DMA callback): every frame, each locked channel reads
//!   its ring at a fractional date and nudges its drift factor. Every
//!   `detection_window` frames the input counts are classified and channels
//!   lock, change rate or drop to silence.
//!
//! Both calls are bounded loops over a small burst. Nothing allocates or
//! blocks after [`Mixer::new`]; the caller serializes pushes per channel and
//! never re-enters the mixer.

mod channel;
pub mod detection;
mod drift;

pub use channel::{ChannelState, WindowOutcome};
pub use detection::RateDetector;
pub use drift::DriftTracker;

use crate::config::{DriftConfig, MixerConfig};
use crate::error::MixerResult;
use crate::types::{ChannelId, RawFrame, Sample, SampleRate, StereoSample, NUM_CHANNELS};

/// The mixing engine
pub struct Mixer {
    channels: [ChannelState; NUM_CHANNELS],
    detector: RateDetector,
    drift: DriftConfig,
    detection_window: u32,
    lock_windows: u32,
    master_gain: Sample,
    /// Output frames since the last detection window
    pull_count: u32,
}

impl Mixer {
    /// Build a mixer from a validated configuration
    pub fn new(config: &MixerConfig) -> MixerResult<Self> {
        config.validate()?;

        log::info!(
            "[MIXER] window={} tolerance={} lock_windows={} latency={} frames",
            config.detection_window,
            config.rate_tolerance,
            config.lock_windows,
            config.drift.latency_frames
        );

        Ok(Self::from_valid(config))
    }

    fn from_valid(config: &MixerConfig) -> Self {
        Self {
            channels: std::array::from_fn(|i| {
                ChannelState::new(ChannelId::ALL[i], config.gains[i])
            }),
            detector: RateDetector::new(config),
            drift: config.drift.clone(),
            detection_window: config.detection_window,
            lock_windows: config.lock_windows,
            master_gain: config.master_gain,
            pull_count: 0,
        }
    }

    /// Deliver one reception burst for `channel`
    pub fn push_samples(&mut self, channel: ChannelId, frames: &[RawFrame]) {
        self.channels[channel.index()].push(frames);
    }

    /// Fill `out` with mixed 24-bit frames
    pub fn pull_samples(&mut self, out: &mut [RawFrame]) {
        for frame in out.iter_mut() {
            if self.pull_count >= self.detection_window {
                self.detect_rates();
                self.pull_count = 0;
            }

            let mut mix = StereoSample::silence();
            for channel in self.channels.iter_mut() {
                mix += channel.render(&self.drift);
            }
            *frame = mix.scale(self.master_gain).to_raw();

            self.pull_count += 1;
        }
    }

    /// Classify every channel's input count for the window that just ended
    fn detect_rates(&mut self) {
        for channel in self.channels.iter_mut() {
            let count = channel.input_count();
            let detected = self.detector.classify(count);
            match channel.end_window(detected, self.lock_windows) {
                WindowOutcome::Unchanged => {}
                WindowOutcome::Pending(rate) => {
                    log::debug!(
                        "[MIXER] {} sees {} ({} frames), waiting for confirmation",
                        channel.id(),
                        rate,
                        count
                    );
                }
                WindowOutcome::Locked(rate) => {
                    log::info!("[MIXER] {} locked at {}", channel.id(), rate);
                }
                WindowOutcome::Lost => {
                    log::warn!(
                        "[MIXER] {} lost sync ({} frames in window)",
                        channel.id(),
                        count
                    );
                }
            }
        }
    }

    /// Set the linear gain of one input (no bounds applied)
    pub fn set_gain(&mut self, channel: ChannelId, gain: Sample) {
        self.channels[channel.index()].set_gain(gain);
    }

    pub fn gain(&self, channel: ChannelId) -> Sample {
        self.channels[channel.index()].gain()
    }

    /// Set the linear gain applied to the sum (no bounds applied)
    pub fn set_master_gain(&mut self, gain: Sample) {
        self.master_gain = gain;
    }

    pub fn master_gain(&self) -> Sample {
        self.master_gain
    }

    /// Detected rate of an input, `NoSync` while unlocked or pending
    pub fn sample_rate(&self, channel: ChannelId) -> SampleRate {
        self.channels[channel.index()].sample_rate()
    }

    /// Current drift factor of an input (0 while unlocked)
    pub fn drift_factor(&self, channel: ChannelId) -> f64 {
        self.channels[channel.index()].drift_factor()
    }

    /// Distance between write head and read point on the last pulled frame
    pub fn buffer_age(&self, channel: ChannelId) -> f64 {
        self.channels[channel.index()].buffer_age()
    }

    /// Drop an input to silence as if its rate had stopped matching
    pub fn force_no_sync(&mut self, channel: ChannelId) {
        log::info!("[MIXER] {} reset", channel);
        self.channels[channel.index()].enter_no_sync();
    }

    /// Read-only view of one input's state
    pub fn channel(&self, channel: ChannelId) -> &ChannelState {
        &self.channels[channel.index()]
    }

    pub fn drift_config(&self) -> &DriftConfig {
        &self.drift
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::from_valid(&MixerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FULL_SCALE_24, RX_BURST, TX_BURST};

    /// Delivers bursts at `ratio` input frames per output frame
    struct Feeder {
        ratio: f64,
        phase: f64,
        written: i32,
        level: Option<i32>,
    }

    impl Feeder {
        fn new(rate_hz: f64, skew: f64) -> Self {
            Self {
                ratio: rate_hz / 48000.0 * skew,
                phase: 0.0,
                written: 0,
                level: None,
            }
        }

        fn constant(mut self, level: i32) -> Self {
            self.level = Some(level);
            self
        }

        /// Push whatever bursts are due for `out_frames` output frames
        fn feed(&mut self, mixer: &mut Mixer, channel: ChannelId, out_frames: usize) {
            self.phase += out_frames as f64 * self.ratio;
            while self.phase >= RX_BURST as f64 {
                self.phase -= RX_BURST as f64;
                let mut burst = [[0i32; 2]; RX_BURST];
                for frame in burst.iter_mut() {
                    let v = self.level.unwrap_or((self.written % 1000) * 1000);
                    *frame = [v, -v];
                    self.written += 1;
                }
                mixer.push_samples(channel, &burst);
            }
        }
    }

    /// Run `frames` output frames, feeding each channel that has a feeder
    fn run(
        mixer: &mut Mixer,
        feeders: &mut [(ChannelId, Feeder)],
        frames: usize,
        mut on_block: impl FnMut(&Mixer, usize, &[RawFrame]),
    ) {
        let mut out = [[0i32; 2]; TX_BURST];
        let mut done = 0;
        while done < frames {
            for (channel, feeder) in feeders.iter_mut() {
                feeder.feed(mixer, *channel, TX_BURST);
            }
            mixer.pull_samples(&mut out);
            done += TX_BURST;
            on_block(mixer, done, &out);
        }
    }

    #[test]
    fn test_silent_inputs_give_silent_output() {
        let mut mixer = Mixer::default();
        run(&mut mixer, &mut [], 50_000, |m, _, out| {
            assert!(out.iter().all(|f| *f == [0, 0]), "expected silence");
            for ch in ChannelId::ALL {
                assert_eq!(m.sample_rate(ch), SampleRate::NoSync);
                assert_eq!(m.drift_factor(ch), 0.0);
            }
        });
    }

    #[test]
    fn test_locks_each_standard_rate() {
        for (hz, expected) in [
            (32000.0, SampleRate::Sr32000),
            (44100.0, SampleRate::Sr44100),
            (48000.0, SampleRate::Sr48000),
            (88200.0, SampleRate::Sr88200),
            (96000.0, SampleRate::Sr96000),
        ] {
            let mut mixer = Mixer::default();
            let mut feeders = [(ChannelId::In2, Feeder::new(hz, 1.0))];
            run(&mut mixer, &mut feeders, 5_000, |_, _, _| {});
            assert_eq!(mixer.sample_rate(ChannelId::In2), expected, "{} Hz", hz);
            assert_eq!(mixer.drift_factor(ChannelId::In1), 0.0);
            assert_eq!(mixer.drift_factor(ChannelId::In3), 0.0);
        }
    }

    #[test]
    fn test_rate_needs_two_windows() {
        let mut mixer = Mixer::default();
        let mut feeders = [(ChannelId::In1, Feeder::new(48000.0, 1.0))];
        // First window closes at frame 1000 (checked on frame 1001)
        run(&mut mixer, &mut feeders, 1_005, |_, _, _| {});
        assert_eq!(mixer.sample_rate(ChannelId::In1), SampleRate::NoSync);
        run(&mut mixer, &mut feeders, 1_000, |_, _, _| {});
        assert_eq!(mixer.sample_rate(ChannelId::In1), SampleRate::Sr48000);
        // Starts at nominal; the few frames after the lock only nudge it
        assert!((mixer.drift_factor(ChannelId::In1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_drift_converges_to_faster_source() {
        let true_ratio = 1.001;
        // A longer target keeps each burst arrival a small fraction of the error
        let mut config = MixerConfig::default();
        config.drift.latency_frames = (RX_BURST * 4) as f64;
        let mut mixer = Mixer::new(&config).unwrap();
        let mut feeders = [(ChannelId::In1, Feeder::new(48000.0, true_ratio))];

        let mut history = Vec::new();
        run(&mut mixer, &mut feeders, 400_000, |m, done, _| {
            let factor = m.drift_factor(ChannelId::In1);
            if done % 10_000 == 0 && factor != 0.0 {
                history.push(factor);
            }
        });

        assert_eq!(mixer.sample_rate(ChannelId::In1), SampleRate::Sr48000);
        assert!(history.len() >= 39, "channel should stay locked");

        let errors: Vec<f64> = history.iter().map(|f| (f - true_ratio).abs()).collect();
        for pair in errors.windows(2) {
            assert!(
                pair[1] <= pair[0] + 1e-5,
                "error grew from {:e} to {:e}",
                pair[0],
                pair[1]
            );
        }
        for f in &history {
            assert!(
                *f >= 1.0 && *f <= true_ratio + 5e-5,
                "factor {} left the band between nominal and target",
                f
            );
        }
        assert!(errors[0] > 5e-4, "starts near nominal");
        let last = *errors.last().unwrap();
        assert!(last < 1e-4, "did not converge: error {:e}", last);

        let age = mixer.buffer_age(ChannelId::In1);
        assert!(age > 0.0 && age < 50.0, "read point drifted to age {}", age);
    }

    #[test]
    fn test_one_burst_latency_is_gapless_on_board_pacing() {
        let level = FULL_SCALE_24 / 8;
        let cases = [
            (48000.0, 1.0),
            (48000.0, 1.001),
            (44100.0, 0.9995),
            (96000.0, 1.0003),
            (32000.0, 1.0),
        ];
        for (rate_hz, skew) in cases {
            let mut mixer = Mixer::default();
            assert_eq!(mixer.drift_config().latency_frames, RX_BURST as f64);
            let mut feeders = [(ChannelId::In1, Feeder::new(rate_hz, skew).constant(level))];

            // Lock plus the first part of the drift transient
            run(&mut mixer, &mut feeders, 20_000, |_, _, _| {});
            assert!(mixer.sample_rate(ChannelId::In1).is_synced());

            let mut gaps = 0usize;
            run(&mut mixer, &mut feeders, 180_000, |_, _, out| {
                gaps += out.iter().filter(|f| (f[0] - level).abs() > 2).count();
            });
            assert_eq!(gaps, 0, "{} Hz x {}: {} frames read past the head", rate_hz, skew, gaps);

            let age = mixer.buffer_age(ChannelId::In1);
            assert!(age > 0.0 && age < (RX_BURST * 4) as f64, "age {}", age);
        }
    }

    #[test]
    fn test_sync_loss_silences_and_resets() {
        let level = FULL_SCALE_24 / 4;
        let mut mixer = Mixer::default();
        let mut feeders = [(ChannelId::In3, Feeder::new(44100.0, 1.0).constant(level))];
        run(&mut mixer, &mut feeders, 20_000, |_, _, _| {});
        assert_eq!(mixer.sample_rate(ChannelId::In3), SampleRate::Sr44100);

        // Source unplugged: next window must drop it
        let mut last = [[1, 1]; TX_BURST];
        run(&mut mixer, &mut [], 1_200, |_, _, out| last.copy_from_slice(out));
        let ch = mixer.channel(ChannelId::In3);
        assert_eq!(ch.sample_rate(), SampleRate::NoSync);
        assert_eq!(ch.drift_factor(), 0.0);
        assert_eq!(ch.ring_date(), 0.0);
        assert!(last.iter().all(|f| *f == [0, 0]));
    }

    #[test]
    fn test_force_no_sync_resets_together() {
        let mut mixer = Mixer::default();
        let mut feeders = [(ChannelId::In2, Feeder::new(96000.0, 1.0))];
        run(&mut mixer, &mut feeders, 10_000, |_, _, _| {});
        assert!(mixer.drift_factor(ChannelId::In2) > 0.0);

        mixer.force_no_sync(ChannelId::In2);
        let ch = mixer.channel(ChannelId::In2);
        assert_eq!(ch.sample_rate(), SampleRate::NoSync);
        assert_eq!(ch.ring_date(), 0.0);
        assert_eq!(ch.output_date(), 0.0);
        assert_eq!(ch.drift_factor(), 0.0);
    }

    #[test]
    fn test_mix_applies_gains_and_saturates() {
        let level = FULL_SCALE_24 / 2;
        let mut mixer = Mixer::default();
        let mut feeders = [
            (ChannelId::In1, Feeder::new(48000.0, 1.0).constant(level)),
            (ChannelId::In2, Feeder::new(48000.0, 1.0).constant(level)),
        ];
        run(&mut mixer, &mut feeders, 10_000, |_, _, _| {});

        let mut last = [[0i32; 2]; TX_BURST];
        run(&mut mixer, &mut feeders, 100, |_, _, out| last.copy_from_slice(out));
        // Two half-scale inputs sum to full scale, within truncation
        assert!((last[0][0] - 2 * level).abs() <= 2, "got {}", last[0][0]);
        assert!((last[0][1] + 2 * level).abs() <= 2, "got {}", last[0][1]);

        mixer.set_gain(ChannelId::In2, 0.0);
        mixer.set_master_gain(0.5);
        run(&mut mixer, &mut feeders, 100, |_, _, out| last.copy_from_slice(out));
        assert!((last[0][0] - level / 2).abs() <= 2, "got {}", last[0][0]);

        mixer.set_gain(ChannelId::In2, 3.0);
        mixer.set_master_gain(1.0);
        run(&mut mixer, &mut feeders, 100, |_, _, out| last.copy_from_slice(out));
        assert_eq!(last[0], [FULL_SCALE_24, -FULL_SCALE_24 - 1], "overload saturates");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MixerConfig {
            lock_windows: 0,
            ..Default::default()
        };
        assert!(Mixer::new(&config).is_err());
        assert!(Mixer::new(&MixerConfig::default()).is_ok());
    }

    #[test]
    fn test_initial_gains_from_config() {
        let config = MixerConfig {
            gains: [0.1, 0.2, 0.3],
            master_gain: 0.9,
            ..Default::default()
        };
        let mixer = Mixer::new(&config).unwrap();
        assert_eq!(mixer.gain(ChannelId::In3), 0.3);
        assert_eq!(mixer.master_gain(), 0.9);
    }
}
