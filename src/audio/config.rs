//! What the session asks the device for
//!
//! The device may not agree. Everything the core is sized by comes out
//! of negotiation, see `NegotiatedDuplex::shape`.

use crate::building_blocks::SampleFormat;
use crate::config::DEFAULT_BLOCK_FRAMES;

/// Device index meaning "whatever the host considers the default"
pub const DEFAULT_DEVICE: usize = 0;

/// Ring capacity between input and output stream, in blocks
pub const RING_BLOCKS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Channels processed per frame, same for input and output
    pub channels: u16,
    pub sample_rate: u32,
    /// Preferred frames per block, the device has the final word
    pub block_frames: u32,
    /// 0 = default input device, otherwise the number shown by `list_devices`
    pub input_device: usize,
    pub output_device: usize,
    /// First device channel used on the input side
    pub input_offset: u16,
    /// First device channel used on the output side
    pub output_offset: u16,
    pub format: SampleFormat,
}

impl StreamRequest {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        StreamRequest {
            channels,
            sample_rate,
            block_frames: DEFAULT_BLOCK_FRAMES,
            input_device: DEFAULT_DEVICE,
            output_device: DEFAULT_DEVICE,
            input_offset: 0,
            output_offset: 0,
            format: SampleFormat::default(),
        }
    }

    pub fn with_block_frames(mut self, frames: u32) -> Self {
        self.block_frames = frames;
        self
    }

    pub fn with_devices(mut self, input: usize, output: usize) -> Self {
        self.input_device = input;
        self.output_device = output;
        self
    }

    pub fn with_offsets(mut self, input: u16, output: u16) -> Self {
        self.input_offset = input;
        self.output_offset = output;
        self
    }

    pub fn with_format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    /// device channels the input stream has to open
    pub fn input_device_channels(&self) -> u16 {
        self.channels.saturating_add(self.input_offset)
    }

    /// device channels the output stream has to open
    pub fn output_device_channels(&self) -> u16 {
        self.channels.saturating_add(self.output_offset)
    }
}

/// Pick the block size the device will actually run at.
/// `None` means the device didn't say, the request is used as is.
pub fn clamp_block_frames(requested: u32, supported: Option<(u32, u32)>) -> u32 {
    let requested = requested.max(1);
    match supported {
        Some((min, max)) if min <= max => requested.clamp(min.max(1), max.max(1)),
        _ => requested,
    }
}
