//! Double-buffered DMA transmission

use crate::mixer::Mixer;
use crate::types::{RawFrame, TX_BURST};

use super::TransmitHandler;

/// 32-bit words in the transmission DMA buffer
pub const TX_DMA_WORDS: usize = 2 * TX_BURST * 2;

/// Output handler: refills whichever half the DMA has just finished sending
pub struct DoubleBufferTx {
    buffer: [i32; TX_DMA_WORDS],
    callbacks: u64,
    halted: bool,
}

impl DoubleBufferTx {
    pub fn new() -> Self {
        Self {
            buffer: [0; TX_DMA_WORDS],
            callbacks: 0,
            halted: false,
        }
    }

    /// Memory the DMA engine reads from
    pub fn dma_buffer(&self) -> &[i32; TX_DMA_WORDS] {
        &self.buffer
    }

    pub fn callbacks(&self) -> u64 {
        self.callbacks
    }

    fn refill(&mut self, mixer: &mut Mixer, second: bool) {
        self.callbacks += 1;
        let frames: &mut [RawFrame] = bytemuck::cast_slice_mut(&mut self.buffer[..]);
        let half = if second {
            &mut frames[TX_BURST..]
        } else {
            &mut frames[..TX_BURST]
        };
        if self.halted {
            half.fill([0, 0]);
        } else {
            mixer.pull_samples(half);
        }
    }
}

impl Default for DoubleBufferTx {
    fn default() -> Self {
        Self::new()
    }
}

impl TransmitHandler for DoubleBufferTx {
    fn on_transmit_half_complete(&mut self, mixer: &mut Mixer) {
        self.refill(mixer, false);
    }

    fn on_transmit_complete(&mut self, mixer: &mut Mixer) {
        self.refill(mixer, true);
    }

    fn on_error(&mut self) {
        if !self.halted {
            log::error!(
                "[TX] Transmitter fault after {} callbacks, output muted",
                self.callbacks
            );
        }
        self.halted = true;
    }

    fn is_halted(&self) -> bool {
        self.halted
    }
}
