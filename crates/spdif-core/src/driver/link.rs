//! S/PDIF receiver link supervision
//!
//! The on-chip S/PDIF receiver has to be re-armed by software whenever it
//! loses the incoming stream. A 100ms timer steps this state machine:
//!
//! ```text
//!            start()                  synced
//!  Inactive ────────► Init ──► Synchro ──────► Run
//!     ▲                ▲          │             │
//!     │ stop() → Stop  └──────────┴─────────────┘
//!     └──────────────┘    not synced / line error
//! ```
//!
//! Samples still flow through the embedded [`DoubleBufferRx`]; the mixer's
//! own rate detection decides whether they are usable.

use crate::mixer::Mixer;
use crate::types::ChannelId;

use super::rx::{DoubleBufferRx, Ungated, RX_DMA_WORDS};
use super::ReceiveHandler;

/// Period of the supervision tick
pub const LINK_TICK_MS: u32 = 100;

/// Register-level operations the state machine needs from the receiver
pub trait SpdifHardware {
    /// Abort reception DMA and put the receiver in idle
    fn stop_reception(&mut self);
    /// Reset the receiver and let it search for a stream
    fn start_sync(&mut self);
    /// Receiver has locked onto a stream
    fn is_synchronized(&self) -> bool;
    /// Start circular DMA into the reception buffer
    fn start_dma(&mut self, words: usize);
    /// Any of the transmission, frame or sync error flags is set
    fn has_line_errors(&self) -> bool;
    /// Symbol width field reported by the receiver, in receiver clock cycles
    fn symbol_width(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Stop,
    Inactive,
    Init,
    Synchro,
    Run,
}

/// Sample rate implied by the measured symbol width
///
/// `None` while the receiver has not measured anything yet.
pub fn estimate_sample_rate(clock_hz: u32, symbol_width: u32) -> Option<u32> {
    if symbol_width == 0 {
        return None;
    }
    let rate = (clock_hz as u64 * 5) / (symbol_width as u64 * 64);
    u32::try_from(rate).ok()
}

/// Round a measured line rate to the nearest standard rate
pub fn classify_line_rate(hz: u32) -> Option<u32> {
    match hz {
        h if h > 190_000 => Some(192_000),
        h if h > 90_000 => Some(96_000),
        h if h > 46_000 => Some(48_000),
        h if h > 40_000 => Some(44_100),
        h if h > 3_000 => Some(32_000),
        _ => None,
    }
}

/// On-chip S/PDIF receiver feeding one mixer input
pub struct SpdifLink<H> {
    hw: H,
    clock_hz: u32,
    state: LinkState,
    line_rate: Option<u32>,
    rx: DoubleBufferRx<Ungated>,
}

impl<H: SpdifHardware> SpdifLink<H> {
    pub fn new(channel: ChannelId, hw: H, clock_hz: u32) -> Self {
        Self {
            hw,
            clock_hz,
            state: LinkState::Inactive,
            line_rate: None,
            rx: DoubleBufferRx::new(channel, Ungated),
        }
    }

    /// Begin (or restart) synchronisation on the next tick
    pub fn start(&mut self) {
        self.state = LinkState::Init;
    }

    /// Shut the receiver down on the next tick
    pub fn stop(&mut self) {
        self.state = LinkState::Stop;
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Standard rate estimated from the line when sync was acquired
    pub fn line_rate(&self) -> Option<u32> {
        self.line_rate
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Memory the DMA engine writes into
    pub fn dma_buffer_mut(&mut self) -> &mut [i32; RX_DMA_WORDS] {
        self.rx.dma_buffer_mut()
    }

    /// Advance the state machine by one timer period
    pub fn tick(&mut self) {
        match self.state {
            LinkState::Stop => {
                self.hw.stop_reception();
                self.line_rate = None;
                self.state = LinkState::Inactive;
                log::info!("[LINK] {} receiver stopped", self.rx.channel());
            }
            LinkState::Inactive => {}
            LinkState::Init => {
                self.hw.stop_reception();
                self.hw.start_sync();
                self.line_rate = None;
                self.state = LinkState::Synchro;
            }
            LinkState::Synchro => {
                if self.hw.is_synchronized() {
                    self.hw.start_dma(RX_DMA_WORDS);
                    self.line_rate = estimate_sample_rate(self.clock_hz, self.hw.symbol_width())
                        .and_then(classify_line_rate);
                    self.state = LinkState::Run;
                    log::info!(
                        "[LINK] {} synchronized, line rate {:?}",
                        self.rx.channel(),
                        self.line_rate
                    );
                } else {
                    self.state = LinkState::Init;
                }
            }
            LinkState::Run => {
                if self.hw.has_line_errors() {
                    log::warn!("[LINK] {} line error, resynchronizing", self.rx.channel());
                    self.state = LinkState::Init;
                }
            }
        }
    }
}

impl<H: SpdifHardware> ReceiveHandler for SpdifLink<H> {
    fn on_receive_half_complete(&mut self, mixer: &mut Mixer) {
        self.rx.on_receive_half_complete(mixer);
    }

    fn on_receive_complete(&mut self, mixer: &mut Mixer) {
        self.rx.on_receive_complete(mixer);
    }

    /// The receiver can be re-armed, so a fault restarts synchronisation
    fn on_error(&mut self) {
        log::warn!("[LINK] {} receiver fault, resynchronizing", self.rx.channel());
        self.state = LinkState::Init;
    }

    fn on_timer(&mut self) {
        self.tick();
    }
}
