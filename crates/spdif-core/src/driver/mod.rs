//! Peripheral callback glue
//!
//! On the target each audio interface raises DMA half/complete interrupts
//! (and the S/PDIF receiver a periodic timer tick). Instead of hard-wiring
//! each interrupt to a global instance, handlers are registered on a
//! [`DeviceRouter`] under the id of the peripheral that fires them, and the
//! interrupt shim forwards a [`DeviceEvent`]:
//!
//! ```ignore
//! let mut router = DeviceRouter::new(Mixer::new(&config)?);
//! router.register_receiver(DeviceId("SAI2_A"), DoubleBufferRx::new(ChannelId::In1, dir9001_pins))?;
//! router.register_receiver(DeviceId("SPDIFRX"), SpdifLink::new(ChannelId::In2, spdifrx, 25_000_000))?;
//! router.register_transmitter(DeviceId("SAI1_A"), DoubleBufferTx::new())?;
//!
//! // From the DMA interrupt:
//! router.dispatch(DeviceEvent::ReceiveHalfComplete(DeviceId("SAI2_A")))?;
//! ```
//!
//! Every event runs to completion on the caller's context; the router does
//! no locking and must not be re-entered.

mod link;
mod rx;
mod tx;

pub use link::{
    classify_line_rate, estimate_sample_rate, LinkState, SpdifHardware, SpdifLink, LINK_TICK_MS,
};
pub use rx::{DoubleBufferRx, LineStatus, Ungated, RX_DMA_WORDS};
pub use tx::{DoubleBufferTx, TX_DMA_WORDS};

use std::fmt;

use crate::error::{MixerError, MixerResult};
use crate::mixer::Mixer;

/// Name of a peripheral instance (e.g. `"SAI2_A"`, `"SPDIFRX"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub &'static str);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Hardware notifications forwarded by the interrupt shim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    ReceiveHalfComplete(DeviceId),
    ReceiveComplete(DeviceId),
    TransmitHalfComplete(DeviceId),
    TransmitComplete(DeviceId),
    /// Periodic timer attached to a receiver
    TimerElapsed(DeviceId),
    /// Peripheral or DMA error
    Error(DeviceId),
}

impl DeviceEvent {
    pub fn device(&self) -> DeviceId {
        match *self {
            DeviceEvent::ReceiveHalfComplete(id)
            | DeviceEvent::ReceiveComplete(id)
            | DeviceEvent::TransmitHalfComplete(id)
            | DeviceEvent::TransmitComplete(id)
            | DeviceEvent::TimerElapsed(id)
            | DeviceEvent::Error(id) => id,
        }
    }
}

/// Consumer of one input interface's DMA callbacks
pub trait ReceiveHandler {
    /// First half of the DMA buffer is ready
    fn on_receive_half_complete(&mut self, mixer: &mut Mixer);
    /// Second half of the DMA buffer is ready
    fn on_receive_complete(&mut self, mixer: &mut Mixer);
    /// The peripheral reported an error
    fn on_error(&mut self);
    /// Periodic housekeeping tick, if the interface has a timer
    fn on_timer(&mut self) {}
    /// Whether the handler has stopped delivering samples for good
    fn is_halted(&self) -> bool {
        false
    }
}

/// Producer for the output interface's DMA callbacks
pub trait TransmitHandler {
    /// First half of the DMA buffer was sent and may be refilled
    fn on_transmit_half_complete(&mut self, mixer: &mut Mixer);
    /// Second half of the DMA buffer was sent and may be refilled
    fn on_transmit_complete(&mut self, mixer: &mut Mixer);
    fn on_error(&mut self);
    fn is_halted(&self) -> bool {
        false
    }
}

/// Owns the mixer and routes each device event to its one handler
pub struct DeviceRouter {
    mixer: Mixer,
    receivers: Vec<(DeviceId, Box<dyn ReceiveHandler>)>,
    transmitters: Vec<(DeviceId, Box<dyn TransmitHandler>)>,
}

impl DeviceRouter {
    pub fn new(mixer: Mixer) -> Self {
        Self {
            mixer,
            receivers: Vec::new(),
            transmitters: Vec::new(),
        }
    }

    /// Attach an input handler to a peripheral
    pub fn register_receiver(
        &mut self,
        id: DeviceId,
        handler: impl ReceiveHandler + 'static,
    ) -> MixerResult<()> {
        self.ensure_free(id)?;
        log::info!("[DRIVER] Receiver registered on {}", id);
        self.receivers.push((id, Box::new(handler)));
        Ok(())
    }

    /// Attach the output handler to a peripheral
    pub fn register_transmitter(
        &mut self,
        id: DeviceId,
        handler: impl TransmitHandler + 'static,
    ) -> MixerResult<()> {
        self.ensure_free(id)?;
        log::info!("[DRIVER] Transmitter registered on {}", id);
        self.transmitters.push((id, Box::new(handler)));
        Ok(())
    }

    fn ensure_free(&self, id: DeviceId) -> MixerResult<()> {
        let taken = self.receivers.iter().any(|(d, _)| *d == id)
            || self.transmitters.iter().any(|(d, _)| *d == id);
        if taken {
            Err(MixerError::DeviceAlreadyRegistered(id))
        } else {
            Ok(())
        }
    }

    /// Run the handler for one hardware event
    pub fn dispatch(&mut self, event: DeviceEvent) -> MixerResult<()> {
        let id = event.device();
        let mixer = &mut self.mixer;

        if let Some((_, rx)) = self.receivers.iter_mut().find(|(d, _)| *d == id) {
            match event {
                DeviceEvent::ReceiveHalfComplete(_) => rx.on_receive_half_complete(mixer),
                DeviceEvent::ReceiveComplete(_) => rx.on_receive_complete(mixer),
                DeviceEvent::TimerElapsed(_) => rx.on_timer(),
                DeviceEvent::Error(_) => rx.on_error(),
                DeviceEvent::TransmitHalfComplete(_) | DeviceEvent::TransmitComplete(_) => {
                    log::warn!("[DRIVER] Ignoring {:?}: {} is a receiver", event, id);
                }
            }
            return Ok(());
        }

        if let Some((_, tx)) = self.transmitters.iter_mut().find(|(d, _)| *d == id) {
            match event {
                DeviceEvent::TransmitHalfComplete(_) => tx.on_transmit_half_complete(mixer),
                DeviceEvent::TransmitComplete(_) => tx.on_transmit_complete(mixer),
                DeviceEvent::Error(_) => tx.on_error(),
                _ => log::warn!("[DRIVER] Ignoring {:?}: {} is a transmitter", event, id),
            }
            return Ok(());
        }

        Err(MixerError::UnknownDevice(id))
    }

    /// Whether the handler registered under `id` has halted
    pub fn is_halted(&self, id: DeviceId) -> MixerResult<bool> {
        if let Some((_, rx)) = self.receivers.iter().find(|(d, _)| *d == id) {
            return Ok(rx.is_halted());
        }
        if let Some((_, tx)) = self.transmitters.iter().find(|(d, _)| *d == id) {
            return Ok(tx.is_halted());
        }
        Err(MixerError::UnknownDevice(id))
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Mutable access for gain changes from the control side
    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }
}
