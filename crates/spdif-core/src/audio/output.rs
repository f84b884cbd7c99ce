//! CPAL output stream

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::error::{AudioError, AudioResult};
use crate::engine::MixerRunner;
use crate::types::{sign_extend_24, RawFrame, FULL_SCALE_24, OUTPUT_SAMPLE_RATE};

/// Frames mixed per pass inside the callback (stack scratch, no allocation)
const SCRATCH_FRAMES: usize = 480;

/// Keeps the output stream alive. Drop this to stop monitoring.
pub struct OutputHandle {
    _stream: Stream,
    device_name: String,
    channels: u16,
}

impl OutputHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Open an output device at 48kHz and start mixing into it
///
/// `device_name` selects a device of the default host by name; `None` uses
/// the default output device.
pub fn start_output(runner: MixerRunner, device_name: Option<&str>) -> AudioResult<OutputHandle> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))?,
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDefaultDevice("no default output".to_string()))?,
    };

    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("[AUDIO] Using output device: {}", name);

    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| {
            OUTPUT_SAMPLE_RATE >= c.min_sample_rate().0 && OUTPUT_SAMPLE_RATE <= c.max_sample_rate().0
        })
        .ok_or_else(|| {
            AudioError::ConfigError(format!(
                "{} has no stereo f32 output at {}Hz",
                name, OUTPUT_SAMPLE_RATE
            ))
        })?;

    let config: StreamConfig = supported
        .with_sample_rate(cpal::SampleRate(OUTPUT_SAMPLE_RATE))
        .into();
    let channels = config.channels;

    log::info!(
        "[AUDIO] Output config: {} channels, {}Hz",
        channels,
        OUTPUT_SAMPLE_RATE
    );

    let stream = build_output_stream(&device, &config, runner)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("[AUDIO] Monitor stream started");

    Ok(OutputHandle {
        _stream: stream,
        device_name: name,
        channels,
    })
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut runner: MixerRunner,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut scratch: [RawFrame; SCRATCH_FRAMES] = [[0; 2]; SCRATCH_FRAMES];

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for block in data.chunks_mut(SCRATCH_FRAMES * channels) {
                    let n_frames = block.len() / channels;
                    let mixed = &mut scratch[..n_frames];
                    runner.process(mixed);

                    for (frame, raw) in block.chunks_mut(channels).zip(mixed.iter()) {
                        frame[0] = to_float(raw[0]);
                        frame[1] = to_float(raw[1]);
                        // Fill additional channels with silence
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("[AUDIO] Output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

#[inline]
fn to_float(raw: i32) -> f32 {
    sign_extend_24(raw) as f32 / FULL_SCALE_24 as f32
}
