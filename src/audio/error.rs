//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while picking devices or running the stream
#[derive(Error, Debug)]
pub enum AudioError {
    /// The host reports no devices at all
    #[error("No audio devices found")]
    NoDevices,

    /// A requested device can't be used
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device doesn't support the requested configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// The device doesn't speak the requested sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Failed to build one of the two streams
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start or pause a stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// The interactive device prompt failed
    #[error("Device selection failed: {0}")]
    DeviceSelection(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
