//! One recording session: the playhead shared with the driver, its
//! controls, and the dump once the stream has ended.

use std::path::PathBuf;

use crate::building_blocks::session_dump::write_capture;
use crate::building_blocks::{ImpulseResponse, Sample};
use crate::config::SessionConfig;
use crate::duplex::{init_duplex, CounterSnapshot, DuplexControls, SharedPlayhead, StreamShape};
use crate::error::Result;

/// what ended up on disk for one capture
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpedFile {
    pub path: PathBuf,
    pub samples: usize,
    pub bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpReport {
    pub input: DumpedFile,
    pub processed: DumpedFile,
    pub counters: CounterSnapshot,
}

pub struct StreamSession<S: Sample> {
    config: SessionConfig,
    shape: StreamShape,
    controls: DuplexControls,
    playhead: SharedPlayhead<S>,
}

impl<S: Sample> StreamSession<S> {
    pub fn new(config: SessionConfig, ir: ImpulseResponse, shape: StreamShape) -> Self {
        let (controls, playhead) = init_duplex::<S>(&config, ir, &shape);

        log::debug!(
            "session: {} Hz, {} channels, {} frames per block, {} samples per capture",
            shape.sample_rate,
            shape.channels,
            shape.block_frames,
            playhead.input_capture().capacity()
        );

        StreamSession {
            config,
            shape,
            controls,
            playhead: SharedPlayhead::new(playhead),
        }
    }

    /// a handle for the audio callback
    pub fn playhead(&self) -> SharedPlayhead<S> {
        self.playhead.clone()
    }

    pub fn controls(&self) -> &DuplexControls {
        &self.controls
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn shape(&self) -> StreamShape {
        self.shape
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.controls.counters()
    }

    /// Write both captures to their files.
    /// The stream has to be stopped before this is called, otherwise
    /// this just waits for the playhead.
    pub fn finish(self) -> Result<DumpReport> {
        let (input, processed) = {
            let mut playhead = self.playhead.lock();
            playhead.freeze_captures();
            playhead.take_captures()
        };

        // log what the playhead still had queued
        self.controls.report_pending();

        let input_bytes = write_capture(&self.config.input_dump_path, &input)?;
        let processed_bytes = write_capture(&self.config.output_dump_path, &processed)?;

        Ok(DumpReport {
            input: DumpedFile {
                path: self.config.input_dump_path.clone(),
                samples: input.len(),
                bytes: input_bytes,
            },
            processed: DumpedFile {
                path: self.config.output_dump_path.clone(),
                samples: processed.len(),
                bytes: processed_bytes,
            },
            counters: self.controls.counters(),
        })
    }
}
