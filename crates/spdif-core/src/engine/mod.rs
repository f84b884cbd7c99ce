//! Hosted mixer engine
//!
//! On the microcontroller the mixer lives inside interrupt handlers (see
//! [`driver`](crate::driver)). On a host the inputs, the output and the
//! control side run on separate threads, so the mixer is wrapped the same
//! way the audio thread of a desktop player is:
//!
//! ```text
//! ┌──────────────┐  InputFeed (SPSC, per input)  ┌──────────────────┐
//! │ capture ×3   │──────────────────────────────►│                  │
//! └──────────────┘                               │   MixerRunner    │──► output callback
//! ┌──────────────┐  CommandSender (SPSC)         │  (owns Mixer)    │
//! │ control      │──────────────────────────────►│                  │
//! └──────────────┘                               └────────┬─────────┘
//!        ▲                 MixerAtomics (relaxed)         │
//!        └────────────────────────────────────────────────┘
//! ```
//!
//! Nothing on the audio thread blocks or allocates.

mod atomics;
mod command;
mod feed;
mod runner;

pub use atomics::{ChannelAtomics, MixerAtomics};
pub use command::{command_channel, CommandSender, MixerCommand, COMMAND_QUEUE_CAPACITY};
pub use feed::{channel_feeds, InputFeed};
pub use runner::{
    build_mixer_system, MixerRunner, MixerSystem, HOSTED_LATENCY_FRAMES, HOSTED_RATE_TOLERANCE,
};
