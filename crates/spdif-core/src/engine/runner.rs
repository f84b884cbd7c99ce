//! Mixer thread driver for hosted builds

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::MixerConfig;
use crate::error::MixerResult;
use crate::mixer::Mixer;
use crate::types::{ChannelId, RawFrame, NUM_CHANNELS, RING_CAPACITY, RX_BURST, TX_BURST};

use super::atomics::MixerAtomics;
use super::command::{command_channel, CommandSender, MixerCommand};
use super::feed::{channel_feeds, InputFeed};

/// Narrowest detection band that survives burst spreading
///
/// Spreading moves a burst by up to one burst period either side of where
/// it was captured, so a window can gain or lose a burst at each end.
pub const HOSTED_RATE_TOLERANCE: u32 = (RX_BURST * 3) as u32;

/// Shortest read latency, in input frames, that survives callback batching
///
/// A 480-frame callback at 44.1 kHz lets the read point overtake the newest
/// burst at one burst of latency; two bursts is the measured minimum, four
/// leaves room for scheduling jitter.
pub const HOSTED_LATENCY_FRAMES: f64 = (RX_BURST * 4) as f64;

const _: () = assert!(RX_BURST * 4 < RING_CAPACITY / 2);

/// Owns the mixer on the audio thread
///
/// Each [`process`](Self::process) call stands in for a run of output DMA
/// interrupts: input bursts that arrived since the previous call are spread
/// evenly between the `TX_BURST` sub-blocks, so the rate detector sees them
/// at the pace they were captured rather than in one lump per callback.
pub struct MixerRunner {
    mixer: Mixer,
    inputs: [rtrb::Consumer<RawFrame>; NUM_CHANNELS],
    commands: rtrb::Consumer<MixerCommand>,
    atomics: Arc<MixerAtomics>,
}

/// Everything the other threads need to talk to a running mixer
pub struct MixerSystem {
    /// Move this onto the audio thread
    pub runner: MixerRunner,
    /// One per input, move each onto its capture thread
    pub feeds: [InputFeed; NUM_CHANNELS],
    pub commands: CommandSender,
    pub atomics: Arc<MixerAtomics>,
}

/// Build a mixer with its queues
///
/// `queue_frames` is the capacity of each input queue; it must cover the
/// input that arrives during the longest gap between two `process` calls.
/// A `rate_tolerance` below [`HOSTED_RATE_TOLERANCE`] and a latency below
/// [`HOSTED_LATENCY_FRAMES`] are widened to those values.
pub fn build_mixer_system(config: &MixerConfig, queue_frames: usize) -> MixerResult<MixerSystem> {
    let mut config = config.clone();
    if config.rate_tolerance < HOSTED_RATE_TOLERANCE {
        log::info!(
            "[ENGINE] Widening rate tolerance {} -> {} frames for hosted input",
            config.rate_tolerance,
            HOSTED_RATE_TOLERANCE
        );
        config.rate_tolerance = HOSTED_RATE_TOLERANCE;
    }
    if config.drift.latency_frames < HOSTED_LATENCY_FRAMES {
        log::info!(
            "[ENGINE] Widening read latency {} -> {} frames for hosted input",
            config.drift.latency_frames,
            HOSTED_LATENCY_FRAMES
        );
        config.drift.latency_frames = HOSTED_LATENCY_FRAMES;
    }
    let mixer = Mixer::new(&config)?;
    let atomics = Arc::new(MixerAtomics::new());
    let (feeds, inputs) = channel_feeds(queue_frames, &atomics);
    let (commands, command_rx) = command_channel();

    log::info!(
        "[ENGINE] Mixer system ready ({} frames per input queue)",
        queue_frames
    );

    Ok(MixerSystem {
        runner: MixerRunner {
            mixer,
            inputs,
            commands: command_rx,
            atomics: Arc::clone(&atomics),
        },
        feeds,
        commands,
        atomics,
    })
}

impl MixerRunner {
    /// Fill `out` with mixed frames (non-blocking, allocation-free)
    pub fn process(&mut self, out: &mut [RawFrame]) {
        self.process_commands();

        let blocks = out.len().div_ceil(TX_BURST);
        let pending: [usize; NUM_CHANNELS] =
            std::array::from_fn(|i| self.inputs[i].slots() / RX_BURST);
        let mut delivered = [0usize; NUM_CHANNELS];

        for (b, block) in out.chunks_mut(TX_BURST).enumerate() {
            for (i, channel) in ChannelId::ALL.into_iter().enumerate() {
                // Bursts owed by the end of this block, rounded up
                let due = ((b + 1) * pending[i]).div_ceil(blocks);
                while delivered[i] < due {
                    self.deliver_burst(channel);
                    delivered[i] += 1;
                }
            }
            self.mixer.pull_samples(block);
        }

        self.publish(out.len());
    }

    fn deliver_burst(&mut self, channel: ChannelId) {
        if let Ok(chunk) = self.inputs[channel.index()].read_chunk(RX_BURST) {
            let (first, second) = chunk.as_slices();
            self.mixer.push_samples(channel, first);
            if !second.is_empty() {
                self.mixer.push_samples(channel, second);
            }
            chunk.commit_all();
        }
    }

    fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            match cmd {
                MixerCommand::SetGain { channel, gain } => self.mixer.set_gain(channel, gain),
                MixerCommand::SetMasterGain(gain) => self.mixer.set_master_gain(gain),
                MixerCommand::ResetChannel(channel) => self.mixer.force_no_sync(channel),
            }
        }
    }

    fn publish(&self, frames: usize) {
        for channel in ChannelId::ALL {
            self.atomics.channels[channel.index()].store(
                self.mixer.sample_rate(channel),
                self.mixer.drift_factor(channel),
                self.mixer.buffer_age(channel),
            );
        }
        self.atomics
            .frames_out
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn atomics(&self) -> Arc<MixerAtomics> {
        Arc::clone(&self.atomics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SampleRate, FULL_SCALE_24};

    fn system() -> MixerSystem {
        build_mixer_system(&MixerConfig::default(), 4096).unwrap()
    }

    #[test]
    fn test_silent_system_outputs_zero() {
        let mut sys = system();
        let mut out = [[1i32; 2]; 256];
        for _ in 0..100 {
            sys.runner.process(&mut out);
            assert!(out.iter().all(|f| *f == [0, 0]));
        }
        assert_eq!(sys.atomics.frames_out(), 25_600);
        assert_eq!(sys.atomics.sample_rates(), [SampleRate::NoSync; NUM_CHANNELS]);
    }

    #[test]
    fn test_large_callbacks_still_lock() {
        let mut sys = system();
        let mut out = [[0i32; 2]; 480];
        let level = FULL_SCALE_24 / 4;
        let mut phase = 0.0f64;
        for _ in 0..50 {
            // 44.1kHz source: 441 frames per 480 output frames, captured in bursts
            phase += 441.0;
            while phase >= RX_BURST as f64 {
                phase -= RX_BURST as f64;
                sys.feeds[2].push_burst(&[[level, -level]; RX_BURST]);
            }
            sys.runner.process(&mut out);
        }
        assert_eq!(sys.atomics.channels[2].sample_rate(), SampleRate::Sr44100);
        assert!((sys.atomics.channels[2].drift_factor() - 0.91875).abs() < 1e-3);
        let expected = level as f32 / FULL_SCALE_24 as f32;
        let got = out[479][0] as f32 / FULL_SCALE_24 as f32;
        assert!((got - expected).abs() < 1e-5, "{} vs {}", got, expected);
    }

    #[test]
    fn test_tolerance_widened_for_hosting() {
        let config = MixerConfig::default();
        assert!(config.rate_tolerance < HOSTED_RATE_TOLERANCE);
        // 1015 frames per window lies outside the band a board would accept
        let mut sys = build_mixer_system(&config, 4096).unwrap();
        let mut out = [[0i32; 2]; 1000];
        for _ in 0..3 {
            for _ in 0..203 {
                sys.feeds[0].push_burst(&[[0, 0]; RX_BURST]);
            }
            sys.runner.process(&mut out);
        }
        sys.runner.process(&mut out[..TX_BURST]);
        assert_eq!(sys.atomics.channels[0].sample_rate(), SampleRate::Sr48000);
    }

    #[test]
    fn test_latency_widened_for_hosting() {
        let config = MixerConfig::default();
        assert_eq!(config.drift.latency_frames, RX_BURST as f64);
        let sys = build_mixer_system(&config, 4096).unwrap();
        assert_eq!(sys.runner.mixer().drift_config().latency_frames, HOSTED_LATENCY_FRAMES);

        // A longer latency is left alone
        let mut config = MixerConfig::default();
        config.drift.latency_frames = 40.0;
        let sys = build_mixer_system(&config, 4096).unwrap();
        assert_eq!(sys.runner.mixer().drift_config().latency_frames, 40.0);
    }

    #[test]
    fn test_batched_callbacks_never_starve_the_read_point() {
        let mut sys = system();
        let mut out = [[0i32; 2]; 480];
        let level = FULL_SCALE_24 / 4;
        let mut phase = 0.0f64;
        let mut gaps = 0usize;
        for call in 0..400 {
            phase += 441.0;
            while phase >= RX_BURST as f64 {
                phase -= RX_BURST as f64;
                sys.feeds[2].push_burst(&[[level, level]; RX_BURST]);
            }
            sys.runner.process(&mut out);
            // Skip lock acquisition and the first drift transient
            if call >= 100 {
                gaps += out.iter().filter(|f| (f[0] - level).abs() > 2).count();
            }
        }
        assert_eq!(sys.atomics.channels[2].sample_rate(), SampleRate::Sr44100);
        assert_eq!(gaps, 0, "{} frames fell outside the written span", gaps);
    }

    #[test]
    fn test_commands_applied_before_mixing() {
        let mut sys = system();
        sys.commands
            .send(MixerCommand::SetGain {
                channel: ChannelId::In2,
                gain: 0.25,
            })
            .unwrap();
        sys.commands.send(MixerCommand::SetMasterGain(2.0)).unwrap();
        let mut out = [[0i32; 2]; TX_BURST];
        sys.runner.process(&mut out);
        assert_eq!(sys.runner.mixer().gain(ChannelId::In2), 0.25);
        assert_eq!(sys.runner.mixer().master_gain(), 2.0);
    }

    #[test]
    fn test_reset_command_drops_lock() {
        let mut sys = system();
        let mut out = [[0i32; 2]; TX_BURST];
        for _ in 0..1_000 {
            sys.feeds[0].push_burst(&[[0, 0]; RX_BURST]);
            sys.runner.process(&mut out);
        }
        assert_eq!(sys.atomics.channels[0].sample_rate(), SampleRate::Sr48000);

        sys.commands
            .send(MixerCommand::ResetChannel(ChannelId::In1))
            .unwrap();
        sys.runner.process(&mut out);
        assert_eq!(sys.atomics.channels[0].sample_rate(), SampleRate::NoSync);
        assert_eq!(sys.atomics.channels[0].drift_factor(), 0.0);
    }

    #[test]
    fn test_partial_burst_waits_for_completion() {
        let mut sys = system();
        let mut out = [[0i32; 2]; TX_BURST];
        sys.feeds[1].push_burst(&[[5, 5]; 3]);
        sys.runner.process(&mut out);
        assert_eq!(sys.runner.mixer().channel(ChannelId::In2).input_count(), 0);

        sys.feeds[1].push_burst(&[[5, 5]; 2]);
        sys.runner.process(&mut out);
        assert_eq!(
            sys.runner.mixer().channel(ChannelId::In2).input_count(),
            RX_BURST as u32
        );
    }
}
