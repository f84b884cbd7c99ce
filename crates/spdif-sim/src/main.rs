//! spdif-sim - drive the mixer core with synthetic inputs
//!
//! Each input is a sine tone at its own sample rate and clock error. The
//! mixer runs exactly as on the board (bursts of input between bursts of
//! output) and the 48kHz 24-bit mix is written to a WAV file, or played
//! through the sound card with `--play`.
//!
//! Set RUST_LOG=debug to see rate candidates as they are confirmed.

mod args;
mod monitor;
mod source;

use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use spdif_core::config::{default_config_path, load_mixer_config};
use spdif_core::engine::{build_mixer_system, InputFeed, MixerAtomics, MixerSystem};
use spdif_core::{ChannelId, RawFrame, NUM_CHANNELS, OUTPUT_SAMPLE_RATE, RX_BURST, TX_BURST};

use args::{SimArgs, USAGE};
use monitor::StatusMonitor;
use source::ToneSource;

/// Input queue depth; covers any host callback up to ~40ms at 96kHz
const QUEUE_FRAMES: usize = RX_BURST * 800;

/// Tone per input, far enough apart to tell them apart in a spectrum
const TONES_HZ: [f64; NUM_CHANNELS] = [440.0, 660.0, 990.0];

/// Per-source level; three full tones still sum below full scale
const TONE_AMPLITUDE: f64 = 0.25;

fn main() -> Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = SimArgs::parse(raw)?;
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = load_mixer_config(&config_path);

    log::info!("spdif-sim starting up ({:.1}s simulated)", args.seconds);

    let sources: [ToneSource; NUM_CHANNELS] = std::array::from_fn(|i| {
        ToneSource::new(args.rates[i], args.ppm[i], TONES_HZ[i], TONE_AMPLITUDE)
    });
    for (i, channel) in ChannelId::ALL.into_iter().enumerate() {
        if sources[i].is_plugged() {
            log::info!("[SIM] {}: {}Hz {:+}ppm", channel, args.rates[i], args.ppm[i]);
        } else {
            log::info!("[SIM] {}: unplugged", channel);
        }
    }
    let system = build_mixer_system(&config, QUEUE_FRAMES)?;

    if args.play {
        return play(&args, system, sources);
    }
    render(&args, system, sources)
}

/// Run the whole simulation as fast as possible into a WAV file
fn render(args: &SimArgs, system: MixerSystem, mut sources: [ToneSource; NUM_CHANNELS]) -> Result<()> {
    let MixerSystem {
        mut runner,
        mut feeds,
        atomics,
        ..
    } = system;

    let mut writer = create_wav(&args.out)?;
    let total_blocks = (args.seconds * OUTPUT_SAMPLE_RATE as f64) as usize / TX_BURST;
    let blocks_per_second = OUTPUT_SAMPLE_RATE as usize / TX_BURST;
    let mut block: [RawFrame; TX_BURST] = [[0; 2]; TX_BURST];
    let mut monitor = StatusMonitor::new();

    for n in 0..total_blocks {
        feed_inputs(&mut sources, &mut feeds, TX_BURST);
        runner.process(&mut block);
        monitor.observe(&block);
        monitor.advance(TX_BURST, &atomics);

        for frame in &block {
            writer.write_sample(frame[0])?;
            writer.write_sample(frame[1])?;
        }

        if (n + 1) % blocks_per_second == 0 {
            monitor.log((n + 1) / blocks_per_second, &atomics);
        }
    }

    writer
        .finalize()
        .with_context(|| format!("Failed to finalize {:?}", args.out))?;
    log_dropped(&atomics);
    log::info!(
        "[SIM] Wrote {} frames to {:?}",
        total_blocks * TX_BURST,
        args.out
    );
    Ok(())
}

#[cfg(feature = "device-output")]
fn play(args: &SimArgs, system: MixerSystem, mut sources: [ToneSource; NUM_CHANNELS]) -> Result<()> {
    use std::time::{Duration, Instant};

    let MixerSystem {
        runner,
        mut feeds,
        atomics,
        ..
    } = system;

    let handle = spdif_core::audio::start_output(runner, None)?;
    log::info!("[SIM] Playing through {}", handle.device_name());

    let start = Instant::now();
    let mut sent_frames = 0usize;
    let mut logged_seconds = 0usize;
    // The mix stays on the audio thread, so only rates and LEDs are shown
    let mut monitor = StatusMonitor::new();

    while start.elapsed().as_secs_f64() < args.seconds {
        std::thread::sleep(Duration::from_millis(5));

        // Emit input in board-sized steps up to wall-clock time
        let due = (start.elapsed().as_secs_f64() * OUTPUT_SAMPLE_RATE as f64) as usize;
        while sent_frames + TX_BURST <= due {
            feed_inputs(&mut sources, &mut feeds, TX_BURST);
            monitor.advance(TX_BURST, &atomics);
            sent_frames += TX_BURST;
        }

        let seconds = start.elapsed().as_secs() as usize;
        if seconds > logged_seconds {
            logged_seconds = seconds;
            monitor.log(seconds, &atomics);
        }
    }

    log_dropped(&atomics);
    Ok(())
}

#[cfg(not(feature = "device-output"))]
fn play(_args: &SimArgs, _system: MixerSystem, _sources: [ToneSource; NUM_CHANNELS]) -> Result<()> {
    anyhow::bail!("--play needs spdif-sim built with the device-output feature")
}

/// Hand each input the bursts its clock produced during `frames` output frames
fn feed_inputs(
    sources: &mut [ToneSource; NUM_CHANNELS],
    feeds: &mut [InputFeed; NUM_CHANNELS],
    frames: usize,
) {
    for (source, feed) in sources.iter_mut().zip(feeds.iter_mut()) {
        for _ in 0..source.advance(frames) {
            feed.push_burst(&source.next_burst());
        }
    }
}

fn create_wav(path: &Path) -> Result<WavWriter<std::io::BufWriter<std::fs::File>>> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: OUTPUT_SAMPLE_RATE,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };
    WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))
}

fn log_dropped(atomics: &MixerAtomics) {
    for channel in ChannelId::ALL {
        let dropped = atomics.channels[channel.index()].dropped_frames();
        if dropped > 0 {
            log::warn!("[SIM] {} dropped {} input frames (queue full)", channel, dropped);
        }
    }
}
