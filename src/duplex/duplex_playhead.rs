use crossbeam::channel::Sender;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::building_blocks::{
    CaptureBuffer, CaptureKind, ImpulseResponse, Sample, TimeDomainConvolver,
};
use crate::config::SessionConfig;
use crate::duplex::{
    passthrough, CallbackResult, StreamCounters, StreamEvent, StreamShape, StreamStatus,
};

/// This is the "Playhead", that is, the part you use in the
/// duplex callback function of your application.
/// It passes the input through, convolves it and records both.
pub struct DuplexPlayhead<S: Sample> {
    convolver: TimeDomainConvolver,
    input_capture: CaptureBuffer<S>,
    processed_capture: CaptureBuffer<S>,
    // scratch space, sized once for the largest block
    work_in: Vec<f64>,
    work_out: Vec<f64>,
    processed: Vec<S>,
    block_size: usize,
    nanos_per_sample: f64,
    time_report_interval: f64,
    next_time_report: f64,
    stop_when_full: bool,
    input_full_reported: bool,
    processed_full_reported: bool,
    event_q_send: Sender<StreamEvent>,
    counters: Arc<StreamCounters>,
}

impl<S: Sample> DuplexPlayhead<S> {
    pub(crate) fn new(
        config: &SessionConfig,
        ir: ImpulseResponse,
        shape: &StreamShape,
        counters: &Arc<StreamCounters>,
        tx: Sender<StreamEvent>,
    ) -> DuplexPlayhead<S> {
        let block_size = shape.block_samples().max(1);
        let samples_per_sec = shape.sample_rate.max(1) as f64 * shape.channels.max(1) as f64;

        let interval = config.time_report_interval.max(0.0);

        DuplexPlayhead {
            convolver: TimeDomainConvolver::new(ir, block_size),
            input_capture: CaptureBuffer::for_duration(
                shape.sample_rate,
                shape.channels,
                config.recording_seconds,
            ),
            processed_capture: CaptureBuffer::for_duration(
                shape.sample_rate,
                shape.channels,
                config.recording_seconds,
            ),
            work_in: vec![0.0; block_size],
            work_out: vec![0.0; block_size],
            processed: vec![S::default(); block_size],
            block_size,
            nanos_per_sample: 1.0e9 / samples_per_sec,
            time_report_interval: interval,
            next_time_report: interval,
            stop_when_full: config.stop_when_full,
            input_full_reported: false,
            processed_full_reported: false,
            event_q_send: tx,
            counters: Arc::clone(counters),
        }
    }

    /// Handle one block from the driver.
    ///
    /// `input` and `output` are interleaved and normally the same length.
    /// The output always receives the unmodified input first, whatever
    /// happens to the convolution afterwards.
    pub fn process(
        &mut self,
        output: &mut [S],
        input: &[S],
        stream_time: f64,
        status: StreamStatus,
    ) -> CallbackResult {
        let n = passthrough(output, input);

        let started = Instant::now();
        for chunk in input[..n].chunks(self.block_size) {
            self.process_chunk(chunk);
        }
        let elapsed = started.elapsed();

        self.counters.blocks.fetch_add(1);

        if !status.is_clean() {
            self.counters.xruns.fetch_add(1);
            self.emit(StreamEvent::Xrun {
                stream_time,
                status,
            });
        }

        let budget = Duration::from_nanos((n as f64 * self.nanos_per_sample) as u64);
        if elapsed > budget {
            self.counters.overruns.fetch_add(1);
            self.emit(StreamEvent::Overrun {
                stream_time,
                elapsed,
                budget,
            });
        }

        if self.time_report_interval > 0.0 && stream_time >= self.next_time_report {
            self.emit(StreamEvent::StreamTime(stream_time));
            // the next multiple of the interval after now, however far the stream jumped
            let interval = self.time_report_interval;
            let mut next = ((stream_time / interval).floor() + 1.0) * interval;
            if next <= stream_time {
                next += interval;
            }
            self.next_time_report = next;
        }

        if !self.input_full_reported && self.input_capture.is_full() {
            self.input_full_reported = true;
            self.emit(StreamEvent::CaptureFull {
                kind: CaptureKind::Input,
                stream_time,
            });
        }

        if !self.processed_full_reported && self.processed_capture.is_full() {
            self.processed_full_reported = true;
            self.emit(StreamEvent::CaptureFull {
                kind: CaptureKind::Processed,
                stream_time,
            });
        }

        if self.stop_when_full && self.input_capture.is_full() && self.processed_capture.is_full()
        {
            CallbackResult::Stop
        } else {
            CallbackResult::Continue
        }
    }

    // convolve and record one engine block
    fn process_chunk(&mut self, chunk: &[S]) {
        let n = chunk.len();

        for (w, s) in self.work_in[..n].iter_mut().zip(chunk) {
            *w = s.to_f64();
        }

        self.convolver
            .process(&self.work_in[..n], &mut self.work_out[..n]);

        for (p, w) in self.processed[..n].iter_mut().zip(&self.work_out[..n]) {
            *p = S::from_f64(*w);
        }

        self.input_capture.append(chunk);
        self.processed_capture.append(&self.processed[..n]);
    }

    fn emit(&self, event: StreamEvent) {
        // never wait on the reporter, count what doesn't fit
        if self.event_q_send.try_send(event).is_err() {
            self.counters.dropped_events.fetch_add(1);
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn convolver(&self) -> &TimeDomainConvolver {
        &self.convolver
    }

    pub fn input_capture(&self) -> &CaptureBuffer<S> {
        &self.input_capture
    }

    pub fn processed_capture(&self) -> &CaptureBuffer<S> {
        &self.processed_capture
    }

    /// no more recording after this, the stream is done
    pub fn freeze_captures(&mut self) {
        self.input_capture.freeze();
        self.processed_capture.freeze();
    }

    /// move both recordings out, (input, processed)
    pub fn take_captures(&mut self) -> (Vec<S>, Vec<S>) {
        (self.input_capture.drain(), self.processed_capture.drain())
    }

    pub fn counters(&self) -> Arc<StreamCounters> {
        Arc::clone(&self.counters)
    }
}
