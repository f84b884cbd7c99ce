//! spdif-core - Real-time core of a three-input S/PDIF mixer
//!
//! Three asynchronous digital inputs at any standard rate are locked,
//! drift-tracked, resampled and summed into one 48kHz 24-bit stream.

#[cfg(feature = "device-output")]
pub mod audio;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod mixer;
pub mod ring;
pub mod status;
pub mod types;

pub use config::MixerConfig;
pub use error::{MixerError, MixerResult};
pub use mixer::Mixer;
pub use ring::InterpolatingRing;
pub use types::*;
