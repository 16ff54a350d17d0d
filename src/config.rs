//! Session configuration
//!
//! Everything about a run that isn't negotiated with the device:
//! how long to record, where the files live, how diagnostics are paced.

use std::path::PathBuf;

/// Default recording length in seconds
pub const DEFAULT_RECORDING_SECONDS: f64 = 10.0;

/// Default requested block size in frames.
/// The device may settle on a different size, the negotiated one wins.
pub const DEFAULT_BLOCK_FRAMES: u32 = 512;

/// Default impulse response file
pub const DEFAULT_IMPULSE_RESPONSE_PATH: &str = "impulse_response/impres";

pub const DEFAULT_INPUT_DUMP_PATH: &str = "dumpInput.bin";
pub const DEFAULT_OUTPUT_DUMP_PATH: &str = "dumpOutput.bin";

/// How often the stream time is reported, in seconds of stream time
pub const DEFAULT_TIME_REPORT_INTERVAL: f64 = 1.0;

/// Slots in the diagnostics queue between audio thread and reporter
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Seconds of audio each capture buffer can hold
    pub recording_seconds: f64,

    /// Impulse response to convolve with
    pub impulse_response_path: PathBuf,

    /// Raw input recording
    pub input_dump_path: PathBuf,

    /// Convolved recording
    pub output_dump_path: PathBuf,

    /// Stream time between two time reports (0 disables them)
    pub time_report_interval: f64,

    /// Ask the driver to end the stream once both captures are full
    pub stop_when_full: bool,

    pub event_queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recording_seconds: DEFAULT_RECORDING_SECONDS,
            impulse_response_path: PathBuf::from(DEFAULT_IMPULSE_RESPONSE_PATH),
            input_dump_path: PathBuf::from(DEFAULT_INPUT_DUMP_PATH),
            output_dump_path: PathBuf::from(DEFAULT_OUTPUT_DUMP_PATH),
            time_report_interval: DEFAULT_TIME_REPORT_INTERVAL,
            stop_when_full: false,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn with_recording_seconds(mut self, seconds: f64) -> Self {
        self.recording_seconds = seconds;
        self
    }

    pub fn with_impulse_response(mut self, path: impl Into<PathBuf>) -> Self {
        self.impulse_response_path = path.into();
        self
    }

    pub fn with_dump_paths(mut self, input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        self.input_dump_path = input.into();
        self.output_dump_path = output.into();
        self
    }

    pub fn with_time_report_interval(mut self, seconds: f64) -> Self {
        self.time_report_interval = seconds;
        self
    }

    pub fn with_stop_when_full(mut self, stop: bool) -> Self {
        self.stop_when_full = stop;
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }
}
