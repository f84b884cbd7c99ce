//! Double-buffered DMA reception
//!
//! The DMA engine fills a buffer of two bursts in a loop and interrupts at
//! the half and at the end. Each interrupt hands the half that just became
//! stable to the mixer while the other half is being overwritten.

use crate::mixer::Mixer;
use crate::types::{ChannelId, RawFrame, RX_BURST};

use super::ReceiveHandler;

/// 32-bit words in the reception DMA buffer (two bursts, two words per frame)
pub const RX_DMA_WORDS: usize = 2 * RX_BURST * 2;

/// Status lines of an external S/PDIF receiver chip
///
/// The DIR9001 drives a NO_AUDIO pin for non-PCM or absent streams and an
/// ERROR pin on parity/lock errors; samples are only meaningful when both
/// are low.
pub trait LineStatus {
    fn no_audio(&self) -> bool;
    fn transmission_error(&self) -> bool;

    #[inline]
    fn audio_valid(&self) -> bool {
        !self.no_audio() && !self.transmission_error()
    }
}

/// For receivers without status lines: always valid
#[derive(Debug, Clone, Copy, Default)]
pub struct Ungated;

impl LineStatus for Ungated {
    fn no_audio(&self) -> bool {
        false
    }

    fn transmission_error(&self) -> bool {
        false
    }
}

/// Reception handler for one input
pub struct DoubleBufferRx<L> {
    channel: ChannelId,
    line: L,
    /// Interleaved 24-in-32 samples exactly as the DMA writes them
    buffer: [i32; RX_DMA_WORDS],
    callbacks: u64,
    /// Halves withheld because the line flagged them
    gated: u64,
    halted: bool,
}

impl<L: LineStatus> DoubleBufferRx<L> {
    pub fn new(channel: ChannelId, line: L) -> Self {
        Self {
            channel,
            line,
            buffer: [0; RX_DMA_WORDS],
            callbacks: 0,
            gated: 0,
            halted: false,
        }
    }

    /// Memory the DMA engine writes into
    pub fn dma_buffer_mut(&mut self) -> &mut [i32; RX_DMA_WORDS] {
        &mut self.buffer
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Half-transfer interrupts seen so far (gated ones included)
    pub fn callbacks(&self) -> u64 {
        self.callbacks
    }

    pub fn gated(&self) -> u64 {
        self.gated
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    /// Frames of the first (`second == false`) or second DMA half
    fn half(&self, second: bool) -> &[RawFrame] {
        let frames: &[RawFrame] = bytemuck::cast_slice(&self.buffer[..]);
        if second {
            &frames[RX_BURST..]
        } else {
            &frames[..RX_BURST]
        }
    }

    fn deliver(&mut self, mixer: &mut Mixer, second: bool) {
        self.callbacks += 1;
        if self.halted {
            return;
        }
        if !self.line.audio_valid() {
            self.gated += 1;
            return;
        }
        mixer.push_samples(self.channel, self.half(second));
    }

    /// Stop delivering after a peripheral fault
    pub fn halt(&mut self) {
        if !self.halted {
            log::error!(
                "[RX] {} receiver fault, reception halted after {} callbacks",
                self.channel,
                self.callbacks
            );
        }
        self.halted = true;
    }

    /// Resume delivering (after the peripheral was re-armed)
    pub fn resume(&mut self) {
        self.halted = false;
    }

    pub fn halted(&self) -> bool {
        self.halted
    }
}

impl<L: LineStatus> ReceiveHandler for DoubleBufferRx<L> {
    fn on_receive_half_complete(&mut self, mixer: &mut Mixer) {
        self.deliver(mixer, false);
    }

    fn on_receive_complete(&mut self, mixer: &mut Mixer) {
        self.deliver(mixer, true);
    }

    fn on_error(&mut self) {
        self.halt();
    }

    fn is_halted(&self) -> bool {
        self.halted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Pins shared with the test so they can be toggled mid-stream
    #[derive(Clone, Default)]
    struct Pins {
        no_audio: Rc<Cell<bool>>,
        error: Rc<Cell<bool>>,
    }

    impl LineStatus for Pins {
        fn no_audio(&self) -> bool {
            self.no_audio.get()
        }

        fn transmission_error(&self) -> bool {
            self.error.get()
        }
    }

    #[test]
    fn test_halves_reach_the_right_channel() {
        let mut mixer = Mixer::default();
        let mut rx = DoubleBufferRx::new(ChannelId::In2, Ungated);
        for (i, word) in rx.dma_buffer_mut().iter_mut().enumerate() {
            *word = i as i32;
        }

        rx.on_receive_half_complete(&mut mixer);
        assert_eq!(mixer.channel(ChannelId::In2).input_count(), RX_BURST as u32);
        assert_eq!(mixer.channel(ChannelId::In2).ring_date(), RX_BURST as f64);
        rx.on_receive_complete(&mut mixer);
        assert_eq!(mixer.channel(ChannelId::In2).input_count(), 2 * RX_BURST as u32);
        assert_eq!(mixer.channel(ChannelId::In1).input_count(), 0);
        assert_eq!(rx.callbacks(), 2);
    }

    #[test]
    fn test_half_views_split_the_buffer() {
        let mut rx = DoubleBufferRx::new(ChannelId::In1, Ungated);
        for (i, word) in rx.dma_buffer_mut().iter_mut().enumerate() {
            *word = i as i32;
        }
        assert_eq!(rx.half(false)[0], [0, 1]);
        assert_eq!(rx.half(false)[RX_BURST - 1], [8, 9]);
        assert_eq!(rx.half(true)[0], [10, 11]);
        assert_eq!(rx.half(true).len(), RX_BURST);
    }

    #[test]
    fn test_flagged_line_withholds_samples() {
        let mut mixer = Mixer::default();
        let pins = Pins::default();
        let mut rx = DoubleBufferRx::new(ChannelId::In1, pins.clone());

        pins.no_audio.set(true);
        rx.on_receive_half_complete(&mut mixer);
        pins.no_audio.set(false);
        pins.error.set(true);
        rx.on_receive_complete(&mut mixer);
        assert_eq!(mixer.channel(ChannelId::In1).input_count(), 0);
        assert_eq!(rx.gated(), 2);

        pins.error.set(false);
        rx.on_receive_half_complete(&mut mixer);
        assert_eq!(mixer.channel(ChannelId::In1).input_count(), RX_BURST as u32);
        assert_eq!(rx.callbacks(), 3);
    }

    #[test]
    fn test_error_halts_reception() {
        let mut mixer = Mixer::default();
        let mut rx = DoubleBufferRx::new(ChannelId::In3, Ungated);
        rx.on_error();
        assert!(rx.is_halted());
        rx.on_receive_half_complete(&mut mixer);
        rx.on_receive_complete(&mut mixer);
        assert_eq!(mixer.channel(ChannelId::In3).input_count(), 0);

        rx.resume();
        rx.on_receive_complete(&mut mixer);
        assert_eq!(mixer.channel(ChannelId::In3).input_count(), RX_BURST as u32);
    }
}
