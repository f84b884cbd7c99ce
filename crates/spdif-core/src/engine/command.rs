//! Lock-free control queue
//!
//! Gain changes come from a control thread (MIDI, UI, CLI) while the mixer
//! runs on the audio thread. Commands travel over an `rtrb` SPSC ring and
//! are applied at the start of the next processed block, so a block is never
//! mixed with half-updated gains.

use crate::types::{ChannelId, Sample};

/// Commands sent from the control side to the mixer thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MixerCommand {
    /// Linear gain for one input
    SetGain { channel: ChannelId, gain: Sample },
    /// Linear gain applied to the sum
    SetMasterGain(Sample),
    /// Drop an input to silence and restart its rate detection
    ResetChannel(ChannelId),
}

/// Capacity of the command queue
///
/// A fader sweep from a control surface sends a few dozen updates per
/// second; 64 leaves room for a burst while the audio thread is descheduled.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Send side of the command queue
pub struct CommandSender {
    producer: rtrb::Producer<MixerCommand>,
}

impl CommandSender {
    /// Queue a command without blocking
    ///
    /// Returns the command back if the queue is full.
    pub fn send(&mut self, cmd: MixerCommand) -> Result<(), MixerCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }
}

/// Create a bounded command channel
pub fn command_channel() -> (CommandSender, rtrb::Consumer<MixerCommand>) {
    let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);
    (CommandSender { producer }, consumer)
}
