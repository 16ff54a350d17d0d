use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::building_blocks::sample_format::Sample;
use crate::error::{DuplexError, Result};

/// Write `samples` as a headerless little-endian file in the
/// sample's own format. Existing files are truncated.
/// Returns the number of bytes written.
pub fn write_capture<S: Sample>(path: impl AsRef<Path>, samples: &[S]) -> Result<u64> {
    let path = path.as_ref();
    let width = S::FORMAT.width();

    let file = File::create(path).map_err(|e| DuplexError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    let mut raw = [0u8; 8];
    for s in samples {
        s.write_le(&mut raw[..width]);
        writer
            .write_all(&raw[..width])
            .map_err(|e| DuplexError::io(path, e))?;
    }

    writer
        .into_inner()
        .map_err(|e| DuplexError::io(path, e.into_error()))?
        .sync_all()
        .map_err(|e| DuplexError::io(path, e))?;

    let bytes = (samples.len() * width) as u64;
    log::info!(
        "wrote {} {} samples ({} bytes) to {}",
        samples.len(),
        S::FORMAT,
        bytes,
        path.display()
    );

    Ok(bytes)
}

/// Read back a file written by `write_capture`.
pub fn read_capture<S: Sample>(path: impl AsRef<Path>) -> Result<Vec<S>> {
    let path = path.as_ref();
    let width = S::FORMAT.width();

    let file = File::open(path).map_err(|e| DuplexError::io(path, e))?;
    let mut raw = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut raw)
        .map_err(|e| DuplexError::io(path, e))?;

    if raw.len() % width != 0 {
        return Err(DuplexError::CorruptData {
            path: path.to_path_buf(),
            detail: format!(
                "{} bytes is not a whole number of {} samples",
                raw.len(),
                S::FORMAT
            ),
        });
    }

    Ok(raw.chunks_exact(width).map(S::read_le).collect())
}
