//! Monitor output error types

use thiserror::Error;

/// Errors that can occur while opening the monitor output
#[derive(Error, Debug)]
pub enum AudioError {
    /// The host reports no default output
    #[error("No default monitor device: {0}")]
    NoDefaultDevice(String),

    /// No output device carries the requested name
    #[error("Monitor device not found: {0}")]
    DeviceNotFound(String),

    /// The device cannot run stereo f32 at the mixer rate
    #[error("Unusable monitor config: {0}")]
    ConfigError(String),

    #[error("Failed to build monitor stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to start monitor stream: {0}")]
    StreamPlayError(String),
}

/// Result type for monitor output operations
pub type AudioResult<T> = Result<T, AudioError>;
