//! Per-input sample queues
//!
//! On a host each input is captured on its own thread, so pushes can no
//! longer be serialized by interrupt priority. Every input gets its own
//! SPSC ring of raw frames between its capture thread and the mixer thread.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::types::{ChannelId, RawFrame, NUM_CHANNELS};

use super::atomics::MixerAtomics;

/// Capture-side handle for one input
pub struct InputFeed {
    channel: ChannelId,
    producer: rtrb::Producer<RawFrame>,
    atomics: Arc<MixerAtomics>,
}

impl InputFeed {
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Queue one burst of frames without blocking
    ///
    /// Bursts are kept whole: if the queue cannot take all of `frames`, the
    /// whole burst is dropped and counted. Returns the number of frames queued.
    pub fn push_burst(&mut self, frames: &[RawFrame]) -> usize {
        match self.producer.write_chunk_uninit(frames.len()) {
            Ok(chunk) => chunk.fill_from_iter(frames.iter().copied()),
            Err(_) => {
                self.atomics.channels[self.channel.index()]
                    .dropped_frames
                    .fetch_add(frames.len() as u64, Ordering::Relaxed);
                0
            }
        }
    }

    /// Free space in frames
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Create one queue per input, `capacity` frames each
pub fn channel_feeds(
    capacity: usize,
    atomics: &Arc<MixerAtomics>,
) -> (
    [InputFeed; NUM_CHANNELS],
    [rtrb::Consumer<RawFrame>; NUM_CHANNELS],
) {
    let [(p1, c1), (p2, c2), (p3, c3)]: [(rtrb::Producer<RawFrame>, rtrb::Consumer<RawFrame>);
        NUM_CHANNELS] = std::array::from_fn(|_| rtrb::RingBuffer::new(capacity));

    let feed = |channel, producer| InputFeed {
        channel,
        producer,
        atomics: Arc::clone(atomics),
    };
    (
        [
            feed(ChannelId::In1, p1),
            feed(ChannelId::In2, p2),
            feed(ChannelId::In3, p3),
        ],
        [c1, c2, c3],
    )
}
