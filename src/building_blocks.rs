pub mod capture_buffer;
pub mod convolver;
pub mod impulse_response;
pub mod sample_format;
pub mod session_dump;

pub use crate::building_blocks::capture_buffer::CaptureBuffer;
pub use crate::building_blocks::convolver::TimeDomainConvolver;
pub use crate::building_blocks::impulse_response::ImpulseResponse;
pub use crate::building_blocks::sample_format::{Sample, SampleFormat, I24};

/// which of the two recordings of a session
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    Input,
    Processed,
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureKind::Input => f.write_str("input"),
            CaptureKind::Processed => f.write_str("processed"),
        }
    }
}
