//! Live monitoring of the mix through the host sound card
//!
//! The mixer's 48kHz output stands in for the S/PDIF transmitter. The stream
//! callback owns the [`MixerRunner`](crate::engine::MixerRunner), so every
//! output block is mixed on the device's own clock, just as the transmitter
//! DMA would pull it on the board.

mod error;
mod output;

pub use error::{AudioError, AudioResult};
pub use output::{start_output, OutputHandle};
