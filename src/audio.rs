//! Device side of the duplex path
//!
//! Picks devices, negotiates a configuration and drives the playhead
//! from cpal's callbacks. The playhead itself knows nothing about cpal.
//!
//! ```ignore
//! let negotiated = audio::negotiate(&StreamRequest::new(2, 48000))?;
//! let session = StreamSession::<f64>::new(config, ir, negotiated.shape());
//! let mut stream = negotiated.open(session.playhead())?;
//! stream.start()?;
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{clamp_block_frames, StreamRequest, DEFAULT_DEVICE, RING_BLOCKS};
pub use cpal_backend::{
    device_format, negotiate, DeviceSample, DuplexStream, NegotiatedDuplex, Termination,
};
pub use device::{
    list_devices, resolve_index, select_device, select_input_device, select_output_device,
    DeviceChoice, DeviceInfo, Direction,
};
pub use error::{AudioError, AudioResult};
