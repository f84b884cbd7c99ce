//! Mixer error types

use thiserror::Error;

use crate::driver::DeviceId;

/// Errors raised while setting up the mixer or its device glue
///
/// Nothing on the push/pull path returns an error: out-of-range reads yield
/// silence and sync loss is a state change, not a failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixerError {
    /// A tunable is outside its usable range
    #[error("Invalid mixer configuration: {0}")]
    InvalidConfig(String),

    /// Channel index does not name an input
    #[error("Input channel {0} does not exist (valid: 0-2)")]
    ChannelOutOfRange(usize),

    /// A handler is already registered for this device
    #[error("Device {0} already has a handler registered")]
    DeviceAlreadyRegistered(DeviceId),

    /// An event arrived for a device nobody registered
    #[error("No handler registered for device {0}")]
    UnknownDevice(DeviceId),
}

/// Result type for mixer setup operations
pub type MixerResult<T> = Result<T, MixerError>;
