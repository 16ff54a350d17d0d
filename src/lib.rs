//! Duplex pass-through with streaming convolution.
//!
//! The input is played back unchanged, while a copy of it is convolved
//! with a fixed impulse response block by block. Raw input and convolved
//! signal are both recorded and written to headerless sample files once
//! the stream has stopped.
//!
//! The core (`duplex`, `building_blocks`) is device-agnostic and can be
//! driven by anything that calls `SharedPlayhead::process` with blocks of
//! interleaved samples. `audio` does that for cpal devices.

pub mod audio;
pub mod building_blocks;
pub mod config;
pub mod duplex;
pub mod error;
pub mod session;

pub use crate::building_blocks::{ImpulseResponse, Sample, SampleFormat, I24};
pub use crate::config::SessionConfig;
pub use crate::duplex::{
    init_duplex, CallbackResult, CounterSnapshot, DuplexControls, DuplexPlayhead,
    SharedPlayhead, StreamEvent, StreamShape, StreamStatus,
};
pub use crate::error::{DuplexError, Result};
pub use crate::session::{DumpReport, StreamSession};
