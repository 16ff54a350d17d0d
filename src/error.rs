//! Crate level error types

use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;

/// Errors that can end a session
#[derive(Error, Debug)]
pub enum DuplexError {
    /// A file could not be opened, read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sample file does not hold a whole number of samples
    #[error("Corrupt sample data in {}: {detail}", path.display())]
    CorruptData { path: PathBuf, detail: String },

    /// Device selection or stream setup failed
    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl DuplexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DuplexError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, DuplexError>;
