use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::building_blocks::sample_format::Sample;
use crate::error::{DuplexError, Result};

/// The filter coefficients of a session, read-only once loaded.
/// Cloning shares the coefficients, it doesn't copy them.
#[derive(Clone, Debug, PartialEq)]
pub struct ImpulseResponse {
    coefficients: Arc<[f64]>,
}

impl ImpulseResponse {
    pub fn from_coefficients(coefficients: Vec<f64>) -> Self {
        ImpulseResponse {
            coefficients: coefficients.into(),
        }
    }

    /// the identity filter, a single unit coefficient
    pub fn unit() -> Self {
        Self::from_coefficients(vec![1.0])
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.coefficients
    }

    /// length in seconds at the given rate
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.len() as f64 / sample_rate as f64
    }
}

/// Load an impulse response from a headerless file of
/// little-endian f64 values. The number of coefficients
/// follows from the file size.
pub fn load(path: impl AsRef<Path>) -> Result<ImpulseResponse> {
    let path = path.as_ref();
    let width = f64::FORMAT.width();

    let mut file = File::open(path).map_err(|e| DuplexError::io(path, e))?;
    let expected = file.metadata().map_err(|e| DuplexError::io(path, e))?.len();

    if expected % width as u64 != 0 {
        return Err(DuplexError::CorruptData {
            path: path.to_path_buf(),
            detail: format!("{expected} bytes is not a whole number of {width}-byte samples"),
        });
    }

    let mut raw = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut raw)
        .map_err(|e| DuplexError::io(path, e))?;

    if raw.len() as u64 != expected {
        return Err(DuplexError::CorruptData {
            path: path.to_path_buf(),
            detail: format!("expected {expected} bytes, read {}", raw.len()),
        });
    }

    let coefficients: Vec<f64> = raw.chunks_exact(width).map(f64::read_le).collect();

    log::info!(
        "loaded impulse response {} ({} coefficients)",
        path.display(),
        coefficients.len()
    );

    Ok(ImpulseResponse::from_coefficients(coefficients))
}
