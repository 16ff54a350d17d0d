pub mod duplex_controls;
pub mod duplex_playhead;

// crossbeam for the event queue
use crossbeam::atomic::AtomicCell;
use crossbeam::channel::Receiver;
use crossbeam::channel::Sender;

use parking_lot::{Mutex, MutexGuard};

use std::sync::Arc;
use std::time::Duration;

use crate::building_blocks::{CaptureKind, ImpulseResponse, Sample};
use crate::config::SessionConfig;

pub use crate::duplex::{duplex_controls::*, duplex_playhead::*};

/// What the driver settled on when the stream was opened.
/// The core sizes everything from this, never from the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamShape {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_frames: u32,
}

impl StreamShape {
    /// interleaved samples per block
    pub fn block_samples(&self) -> usize {
        self.block_frames as usize * self.channels as usize
    }

    /// the time one block has to be processed in
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.block_frames as f64 / self.sample_rate.max(1) as f64)
    }
}

/// over/underflow flags as signalled by the driver for one block
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStatus {
    pub input_overflow: bool,
    pub output_underflow: bool,
}

impl StreamStatus {
    pub const CLEAN: StreamStatus = StreamStatus {
        input_overflow: false,
        output_underflow: false,
    };

    pub fn is_clean(&self) -> bool {
        !self.input_overflow && !self.output_underflow
    }
}

/// what the callback wants the driver to do next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackResult {
    Continue,
    /// finish the stream, nothing more to record
    Stop,
}

/// Things worth telling the operator about, sent from the
/// audio thread and logged somewhere else.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StreamEvent {
    Xrun {
        stream_time: f64,
        status: StreamStatus,
    },
    StreamTime(f64),
    CaptureFull {
        kind: CaptureKind,
        stream_time: f64,
    },
    /// processing took longer than the block lasts
    Overrun {
        stream_time: f64,
        elapsed: Duration,
        budget: Duration,
    },
}

/// Lock-free counters, written by the audio thread, read by anyone.
#[derive(Default)]
pub struct StreamCounters {
    pub(crate) blocks: AtomicCell<u64>,
    pub(crate) xruns: AtomicCell<u64>,
    pub(crate) overruns: AtomicCell<u64>,
    pub(crate) dropped_events: AtomicCell<u64>,
    pub(crate) contended: AtomicCell<u64>,
    pub(crate) device_errors: AtomicCell<u64>,
}

impl StreamCounters {
    /// stream errors come in through the driver's error callback
    pub fn record_device_error(&self) {
        self.device_errors.fetch_add(1);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            blocks: self.blocks.load(),
            xruns: self.xruns.load(),
            overruns: self.overruns.load(),
            dropped_events: self.dropped_events.load(),
            contended: self.contended.load(),
            device_errors: self.device_errors.load(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub blocks: u64,
    pub xruns: u64,
    pub overruns: u64,
    pub dropped_events: u64,
    pub contended: u64,
    pub device_errors: u64,
}

/// The playhead as the driver sees it.
/// The driver only ever `try_lock`s, so the audio thread can't block on
/// it; the session locks it for real once the stream has stopped.
pub struct SharedPlayhead<S: Sample> {
    inner: Arc<Mutex<DuplexPlayhead<S>>>,
    counters: Arc<StreamCounters>,
}

impl<S: Sample> Clone for SharedPlayhead<S> {
    fn clone(&self) -> Self {
        SharedPlayhead {
            inner: Arc::clone(&self.inner),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<S: Sample> SharedPlayhead<S> {
    pub fn new(playhead: DuplexPlayhead<S>) -> Self {
        let counters = playhead.counters();
        SharedPlayhead {
            inner: Arc::new(Mutex::new(playhead)),
            counters,
        }
    }

    /// Real-time entry point. If the playhead is busy the block is
    /// still passed through, it just isn't convolved or recorded.
    pub fn process(
        &self,
        output: &mut [S],
        input: &[S],
        stream_time: f64,
        status: StreamStatus,
    ) -> CallbackResult {
        match self.inner.try_lock() {
            Some(mut playhead) => playhead.process(output, input, stream_time, status),
            None => {
                passthrough(output, input);
                self.counters.contended.fetch_add(1);
                CallbackResult::Continue
            }
        }
    }

    /// blocking access, not for the audio thread
    pub fn lock(&self) -> MutexGuard<'_, DuplexPlayhead<S>> {
        self.inner.lock()
    }

    pub fn counters(&self) -> Arc<StreamCounters> {
        Arc::clone(&self.counters)
    }
}

/// copy input to output, silence whatever output is left over
#[inline]
pub(crate) fn passthrough<S: Sample>(output: &mut [S], input: &[S]) -> usize {
    let n = input.len().min(output.len());
    output[..n].copy_from_slice(&input[..n]);
    for s in output[n..].iter_mut() {
        *s = S::default();
    }
    n
}

/// Create the two halves of a session. The playhead goes to the
/// audio callback, the controls stay on the control thread.
pub fn init_duplex<S: Sample>(
    config: &SessionConfig,
    ir: ImpulseResponse,
    shape: &StreamShape,
) -> (DuplexControls, DuplexPlayhead<S>) {
    let (tx, rx): (Sender<StreamEvent>, Receiver<StreamEvent>) =
        crossbeam::channel::bounded(config.event_queue_capacity.max(1));

    let counters = Arc::new(StreamCounters::default());

    let controls = DuplexControls::new(shape, &counters, rx);
    let playhead = DuplexPlayhead::new(config, ir, shape, &counters, tx);

    (controls, playhead)
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> StreamShape {
        StreamShape {
            sample_rate: 48000,
            channels: 2,
            block_frames: 4,
        }
    }

    #[test]
    fn test_block_samples_are_interleaved() {
        assert_eq!(shape().block_samples(), 8);
        assert_eq!(
            StreamShape {
                sample_rate: 48000,
                channels: 1,
                block_frames: 24000
            }
            .block_period(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_passthrough_pads_with_silence() {
        let mut out = [9.0_f32; 4];
        assert_eq!(passthrough(&mut out, &[1.0, 2.0]), 2);
        assert_eq!(out, [1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_contended_playhead_still_passes_through() {
        let config = SessionConfig::default().with_recording_seconds(1.0);
        let (controls, playhead) = init_duplex::<f64>(&config, ImpulseResponse::unit(), &shape());
        let shared = SharedPlayhead::new(playhead);

        let input = [0.5, -0.5, 0.25, -0.25, 0.0, 1.0, 0.0, -1.0];
        let mut output = [0.0; 8];

        let guard = shared.lock();
        let res = shared.process(&mut output, &input, 0.0, StreamStatus::CLEAN);
        drop(guard);

        assert_eq!(res, CallbackResult::Continue);
        assert_eq!(output, input);
        assert_eq!(controls.counters().contended, 1);
        // nothing was recorded while locked
        assert!(shared.lock().input_capture().is_empty());

        shared.process(&mut output, &input, 0.0, StreamStatus::CLEAN);
        assert_eq!(shared.lock().input_capture().written(), &input);
    }
}
