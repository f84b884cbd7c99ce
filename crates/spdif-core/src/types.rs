//! Common types for the S/PDIF mixer
//!
//! Sample containers, the recognised input rates, channel identifiers and the
//! fixed sizes every buffer in the core is built from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MixerError;

/// Output clock of the mixer (the S/PDIF transmitter always runs at 48kHz)
pub const OUTPUT_SAMPLE_RATE: u32 = 48000;

/// Number of independent inputs
pub const NUM_CHANNELS: usize = 3;

/// Capacity of each interpolating ring, in stereo frames
pub const RING_CAPACITY: usize = 200;

/// Stereo frames delivered per input DMA half-transfer
pub const RX_BURST: usize = 5;

/// Stereo frames requested per output DMA half-transfer
pub const TX_BURST: usize = 5;

/// Output frames between two rate-detection passes (default)
pub const DETECTION_WINDOW: u32 = 1000;

/// Default distance, in input frames, between the write head and the read point
///
/// One input burst: with interrupt-paced delivery the newest burst always
/// lands before the read point reaches it.
pub const DEFAULT_LATENCY_FRAMES: f64 = RX_BURST as f64;

/// Positive full scale of a 24-bit two's-complement sample
pub const FULL_SCALE_24: i32 = 0x7F_FFFF;

// The read point must sit well inside the ring or drift corrections run into
// the overwrite guard before they can take effect.
const _: () = assert!(RX_BURST < RING_CAPACITY / 2);

/// Audio sample type (32-bit float inside the core, 24-bit integer on the wire)
pub type Sample = f32;

/// One interleaved stereo frame as it sits in a DMA buffer: 24 bits of audio
/// in a 32-bit container, left then right.
pub type RawFrame = [i32; 2];

/// Discard anything above bit 23 and sign-extend the 24-bit value.
#[inline]
pub fn sign_extend_24(raw: i32) -> i32 {
    (raw << 8) >> 8
}

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` so a slice of samples has the same layout as an
/// interleaved `[f32]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Normalize a raw 24-bit frame to roughly [-1, 1]
    #[inline]
    pub fn from_raw(raw: RawFrame) -> Self {
        const SCALE: Sample = FULL_SCALE_24 as Sample;
        Self {
            left: sign_extend_24(raw[0]) as Sample / SCALE,
            right: sign_extend_24(raw[1]) as Sample / SCALE,
        }
    }

    /// Convert back to a raw 24-bit frame
    ///
    /// Values beyond full scale saturate instead of wrapping; the fractional
    /// part is truncated toward zero.
    #[inline]
    pub fn to_raw(&self) -> RawFrame {
        const MAX: Sample = FULL_SCALE_24 as Sample;
        const MIN: Sample = -(FULL_SCALE_24 as Sample) - 1.0;
        let convert = |v: Sample| (v * MAX).clamp(MIN, MAX) as i32;
        [convert(self.left), convert(self.right)]
    }

    /// Scale both channels by a factor
    #[inline]
    pub fn scale(&self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }

    /// Linear blend toward `other`; `frac` = 0 returns `self` exactly
    #[inline]
    pub fn lerp(&self, other: &Self, frac: Sample) -> Self {
        let keep = 1.0 - frac;
        Self {
            left: self.left * keep + other.left * frac,
            right: self.right * keep + other.right * frac,
        }
    }

    /// Larger magnitude of the two sides
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

/// Sample rate recognised on an input, or `NoSync`
///
/// The intermediate 88.2kHz rate is only reported when enabled in
/// [`MixerConfig`](crate::config::MixerConfig).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRate {
    #[default]
    NoSync,
    Sr32000,
    Sr44100,
    Sr48000,
    Sr88200,
    Sr96000,
}

impl SampleRate {
    /// Every rate the detector can lock onto, slowest first
    pub const LOCKABLE: [SampleRate; 5] = [
        SampleRate::Sr32000,
        SampleRate::Sr44100,
        SampleRate::Sr48000,
        SampleRate::Sr88200,
        SampleRate::Sr96000,
    ];

    /// Rate in Hz, `None` when not synchronized
    pub fn hz(self) -> Option<u32> {
        match self {
            SampleRate::NoSync => None,
            SampleRate::Sr32000 => Some(32000),
            SampleRate::Sr44100 => Some(44100),
            SampleRate::Sr48000 => Some(48000),
            SampleRate::Sr88200 => Some(88200),
            SampleRate::Sr96000 => Some(96000),
        }
    }

    /// Exact reverse of [`hz`](Self::hz); anything unknown maps to `NoSync`
    pub fn from_hz(hz: u32) -> Self {
        Self::LOCKABLE
            .into_iter()
            .find(|rate| rate.hz() == Some(hz))
            .unwrap_or(SampleRate::NoSync)
    }

    /// Ideal input frames consumed per output frame (0 when not synchronized)
    #[inline]
    pub fn nominal_factor(self) -> f64 {
        self.hz()
            .map(|hz| hz as f64 / OUTPUT_SAMPLE_RATE as f64)
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn is_synced(self) -> bool {
        self != SampleRate::NoSync
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hz() {
            Some(hz) => write!(f, "{:.1}kHz", hz as f64 / 1000.0),
            None => write!(f, "no sync"),
        }
    }
}

/// Mixer input identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum ChannelId {
    In1 = 0,
    In2 = 1,
    In3 = 2,
}

impl ChannelId {
    /// All inputs in order
    pub const ALL: [ChannelId; NUM_CHANNELS] = [ChannelId::In1, ChannelId::In2, ChannelId::In3];

    /// Convert from index (0-2) to ChannelId
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get the name of this input
    pub fn name(&self) -> &'static str {
        match self {
            ChannelId::In1 => "IN1",
            ChannelId::In2 => "IN2",
            ChannelId::In3 => "IN3",
        }
    }
}

impl TryFrom<usize> for ChannelId {
    type Error = MixerError;

    fn try_from(idx: usize) -> Result<Self, Self::Error> {
        Self::from_index(idx).ok_or(MixerError::ChannelOutOfRange(idx))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
