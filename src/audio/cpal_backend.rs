//! CPAL duplex backend
//!
//! cpal only hands out one-directional streams, so a duplex stream is
//! put together from two of them:
//!
//! ```text
//! ┌──────────────────┐   push()    ┌─────────────────────┐
//! │   Input Stream   │────────────►│   Sample Ring       │
//! │ (strips offset)  │             │  (lock-free SPSC)   │
//! └──────────────────┘             └──────────┬──────────┘
//!                                             │ pop() one block
//!                                  ┌──────────▼──────────┐
//!                                  │   Output Stream     │
//!                                  │  runs the playhead, │
//!                                  │  writes at offset   │
//!                                  └─────────────────────┘
//! ```
//!
//! A push that doesn't fit is an input overflow, a block that can't be
//! filled from the ring is an output underflow. Both reach the playhead
//! as the status of the next block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, Stream, StreamConfig, SupportedBufferSize, SupportedStreamConfigRange};
use crossbeam::channel::{Receiver, Sender};

use super::config::{clamp_block_frames, StreamRequest, RING_BLOCKS};
use super::device::{select_input_device, select_output_device, Direction};
use super::error::{AudioError, AudioResult};
use crate::building_blocks::{Sample, SampleFormat, I24};
use crate::duplex::{CallbackResult, SharedPlayhead, StreamCounters, StreamShape, StreamStatus};

/// A sample type that can travel over a cpal stream.
pub trait DeviceSample: Sample {
    type Device: cpal::SizedSample + Default + Send + 'static;
    const DEVICE_FORMAT: cpal::SampleFormat;

    fn from_device(s: Self::Device) -> Self;
    fn to_device(self) -> Self::Device;
}

impl DeviceSample for i16 {
    type Device = i16;
    const DEVICE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::I16;

    fn from_device(s: i16) -> Self {
        s
    }

    fn to_device(self) -> i16 {
        self
    }
}

// cpal has no packed 24 bit type, the top three bytes of an i32 carry it
impl DeviceSample for I24 {
    type Device = i32;
    const DEVICE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::I32;

    fn from_device(s: i32) -> Self {
        I24::new(s >> 8)
    }

    fn to_device(self) -> i32 {
        self.get() << 8
    }
}

impl DeviceSample for i32 {
    type Device = i32;
    const DEVICE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::I32;

    fn from_device(s: i32) -> Self {
        s
    }

    fn to_device(self) -> i32 {
        self
    }
}

impl DeviceSample for f32 {
    type Device = f32;
    const DEVICE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::F32;

    fn from_device(s: f32) -> Self {
        s
    }

    fn to_device(self) -> f32 {
        self
    }
}

impl DeviceSample for f64 {
    type Device = f64;
    const DEVICE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::F64;

    fn from_device(s: f64) -> Self {
        s
    }

    fn to_device(self) -> f64 {
        self
    }
}

/// the cpal type a format travels as
pub fn device_format(format: SampleFormat) -> cpal::SampleFormat {
    match format {
        SampleFormat::Int16 => <i16 as DeviceSample>::DEVICE_FORMAT,
        SampleFormat::Int24 => <I24 as DeviceSample>::DEVICE_FORMAT,
        SampleFormat::Int32 => <i32 as DeviceSample>::DEVICE_FORMAT,
        SampleFormat::Float32 => <f32 as DeviceSample>::DEVICE_FORMAT,
        SampleFormat::Float64 => <f64 as DeviceSample>::DEVICE_FORMAT,
    }
}

/// Why a running stream ended on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// the playhead asked to stop, captures are full
    Finished,
    /// a device went away
    DeviceLost,
}

/// Devices and configurations both sides agreed on, not running yet.
pub struct NegotiatedDuplex {
    input_device: cpal::Device,
    output_device: cpal::Device,
    input_config: StreamConfig,
    output_config: StreamConfig,
    request: StreamRequest,
    block_frames: u32,
}

/// Pick devices and configurations for `request`.
pub fn negotiate(request: &StreamRequest) -> AudioResult<NegotiatedDuplex> {
    if request.channels == 0 {
        return Err(AudioError::ConfigError("channel count must be at least 1".to_string()));
    }
    if request.sample_rate == 0 {
        return Err(AudioError::ConfigError("sample rate must be at least 1 Hz".to_string()));
    }

    let input_device = select_input_device(request.input_device)?;
    let output_device = select_output_device(request.output_device)?;

    let input_range = find_config(
        &input_device,
        Direction::Input,
        request.input_device_channels(),
        request,
    )?;
    let output_range = find_config(
        &output_device,
        Direction::Output,
        request.output_device_channels(),
        request,
    )?;

    let supported = intersect(
        buffer_range(input_range.buffer_size()),
        buffer_range(output_range.buffer_size()),
    );
    let block_frames = clamp_block_frames(request.block_frames, supported);
    if block_frames != request.block_frames {
        log::warn!(
            "device doesn't support {} frames per block, using {}",
            request.block_frames,
            block_frames
        );
    }

    let stream_config = |range: &SupportedStreamConfigRange| StreamConfig {
        channels: range.channels(),
        sample_rate: cpal::SampleRate(request.sample_rate),
        buffer_size: BufferSize::Fixed(block_frames),
    };

    let negotiated = NegotiatedDuplex {
        input_config: stream_config(&input_range),
        output_config: stream_config(&output_range),
        input_device,
        output_device,
        request: request.clone(),
        block_frames,
    };

    log::info!(
        "duplex config: {} channels, {}Hz, {} frames, {} (input opens {} ch, output opens {} ch)",
        request.channels,
        request.sample_rate,
        block_frames,
        request.format,
        negotiated.input_config.channels,
        negotiated.output_config.channels,
    );

    Ok(negotiated)
}

fn buffer_range(size: &SupportedBufferSize) -> Option<(u32, u32)> {
    match size {
        SupportedBufferSize::Range { min, max } => Some((*min, *max)),
        SupportedBufferSize::Unknown => None,
    }
}

fn intersect(a: Option<(u32, u32)>, b: Option<(u32, u32)>) -> Option<(u32, u32)> {
    match (a, b) {
        (Some((a_min, a_max)), Some((b_min, b_max))) => Some((a_min.max(b_min), a_max.min(b_max))),
        (Some(r), None) | (None, Some(r)) => Some(r),
        (None, None) => None,
    }
}

// smallest config that has enough channels at the right rate and format
fn find_config(
    device: &cpal::Device,
    direction: Direction,
    device_channels: u16,
    request: &StreamRequest,
) -> AudioResult<SupportedStreamConfigRange> {
    let configs: Vec<SupportedStreamConfigRange> = match direction {
        Direction::Input => device
            .supported_input_configs()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .collect(),
        Direction::Output => device
            .supported_output_configs()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .collect(),
    };

    let fitting: Vec<&SupportedStreamConfigRange> = configs
        .iter()
        .filter(|c| c.channels() >= device_channels)
        .filter(|c| {
            request.sample_rate >= c.min_sample_rate().0
                && request.sample_rate <= c.max_sample_rate().0
        })
        .collect();

    if fitting.is_empty() {
        return Err(AudioError::ConfigError(format!(
            "{direction} device can't do {} channels at {}Hz",
            device_channels, request.sample_rate
        )));
    }

    let wanted = device_format(request.format);
    fitting
        .into_iter()
        .filter(|c| c.sample_format() == wanted)
        .min_by_key(|c| c.channels())
        .cloned()
        .ok_or_else(|| {
            AudioError::UnsupportedFormat(format!(
                "{direction} device doesn't offer {} ({:?})",
                request.format, wanted
            ))
        })
}

impl NegotiatedDuplex {
    /// what the core has to be sized for
    pub fn shape(&self) -> StreamShape {
        StreamShape {
            sample_rate: self.request.sample_rate,
            channels: self.request.channels,
            block_frames: self.block_frames,
        }
    }

    /// Build both streams around `playhead`. They are paused until
    /// `DuplexStream::start`.
    pub fn open<S: DeviceSample>(self, playhead: SharedPlayhead<S>) -> AudioResult<DuplexStream> {
        if S::FORMAT != self.request.format {
            return Err(AudioError::UnsupportedFormat(format!(
                "stream negotiated for {}, opened with {}",
                self.request.format,
                S::FORMAT
            )));
        }

        let shape = self.shape();
        let block_samples = shape.block_samples();
        let counters = playhead.counters();

        // the output side starts one block behind the input
        let (mut producer, consumer) = rtrb::RingBuffer::<S>::new(block_samples * RING_BLOCKS);
        for _ in 0..block_samples {
            let _ = producer.push(S::default());
        }
        log::debug!(
            "sample ring created with capacity {} samples",
            block_samples * RING_BLOCKS
        );

        let (term_tx, term_rx) = crossbeam::channel::bounded(4);
        let overflow = Arc::new(AtomicBool::new(false));

        let input = build_input_stream::<S>(
            &self.input_device,
            &self.input_config,
            &self.request,
            producer,
            Arc::clone(&overflow),
            error_callback("input", Arc::clone(&counters), term_tx.clone()),
        )?;

        let output = build_output_stream::<S>(
            &self.output_device,
            &self.output_config,
            &self.request,
            shape,
            consumer,
            overflow,
            playhead,
            term_tx.clone(),
            error_callback("output", counters, term_tx),
        )?;

        Ok(DuplexStream {
            input,
            output,
            sample_rate: shape.sample_rate,
            block_frames: shape.block_frames,
            termination: term_rx,
            running: false,
        })
    }
}

fn error_callback(
    side: &'static str,
    counters: Arc<StreamCounters>,
    term_tx: Sender<Termination>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        log::error!("{side} stream error: {err}");
        counters.record_device_error();
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            let _ = term_tx.try_send(Termination::DeviceLost);
        }
    }
}

/// Push the used channels of every device frame into the ring.
/// A frame goes in whole or not at all, so the ring never holds half a
/// frame. Returns false if any frame had to be dropped.
fn push_frames<S: DeviceSample>(
    producer: &mut rtrb::Producer<S>,
    data: &[S::Device],
    stride: usize,
    offset: usize,
    channels: usize,
) -> bool {
    let mut complete = true;
    for frame in data.chunks_exact(stride) {
        // only this side pushes, the free space can only grow
        if producer.slots() < channels {
            complete = false;
            continue;
        }
        for s in &frame[offset..offset + channels] {
            let _ = producer.push(S::from_device(*s));
        }
    }
    complete
}

/// Fill `block` from the ring with whole frames, silence for whatever
/// is missing. Returns false if the ring couldn't fill the block.
fn pop_frames<S: Sample>(consumer: &mut rtrb::Consumer<S>, block: &mut [S], channels: usize) -> bool {
    let available = consumer.slots() / channels * channels;
    let take = available.min(block.len());
    for slot in block[..take].iter_mut() {
        *slot = consumer.pop().unwrap_or_default();
    }
    block[take..].fill(S::default());
    take == block.len()
}

/// status of the block about to be processed, clears the overflow flag
fn block_status(overflow: &AtomicBool, complete: bool) -> StreamStatus {
    StreamStatus {
        input_overflow: overflow.swap(false, Ordering::Relaxed),
        output_underflow: !complete,
    }
}

/// Interleaved block out to the device frames, starting at `offset`.
/// Device channels outside the used range stay silent.
fn write_frames<S: DeviceSample>(
    dev_chunk: &mut [S::Device],
    samples: &[S],
    stride: usize,
    offset: usize,
    channels: usize,
) {
    for (frame, samples) in dev_chunk
        .chunks_exact_mut(stride)
        .zip(samples.chunks_exact(channels))
    {
        for (ch, d) in frame.iter_mut().enumerate() {
            *d = if ch >= offset && ch < offset + channels {
                samples[ch - offset].to_device()
            } else {
                S::Device::default()
            };
        }
    }
}

fn build_input_stream<S: DeviceSample>(
    device: &cpal::Device,
    config: &StreamConfig,
    request: &StreamRequest,
    mut producer: rtrb::Producer<S>,
    overflow: Arc<AtomicBool>,
    on_error: impl FnMut(cpal::StreamError) + Send + 'static,
) -> AudioResult<Stream> {
    let stride = config.channels as usize;
    let offset = request.input_offset as usize;
    let channels = request.channels as usize;

    device
        .build_input_stream(
            config,
            move |data: &[S::Device], _info: &cpal::InputCallbackInfo| {
                if !push_frames(&mut producer, data, stride, offset, channels) {
                    overflow.store(true, Ordering::Relaxed);
                }
            },
            on_error,
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(format!("input: {e}")))
}

#[allow(clippy::too_many_arguments)]
fn build_output_stream<S: DeviceSample>(
    device: &cpal::Device,
    config: &StreamConfig,
    request: &StreamRequest,
    shape: StreamShape,
    mut consumer: rtrb::Consumer<S>,
    overflow: Arc<AtomicBool>,
    playhead: SharedPlayhead<S>,
    term_tx: Sender<Termination>,
    on_error: impl FnMut(cpal::StreamError) + Send + 'static,
) -> AudioResult<Stream> {
    let stride = config.channels as usize;
    let offset = request.output_offset as usize;
    let channels = request.channels as usize;
    let block_frames = shape.block_frames.max(1) as usize;
    let sample_rate = shape.sample_rate as f64;

    // allocated once, the callback only slices them
    let mut in_block = vec![S::default(); shape.block_samples()];
    let mut out_block = vec![S::default(); shape.block_samples()];
    let mut frames_done: u64 = 0;
    let mut finished = false;

    device
        .build_output_stream(
            config,
            move |data: &mut [S::Device], _info: &cpal::OutputCallbackInfo| {
                for dev_chunk in data.chunks_mut(stride * block_frames) {
                    if finished {
                        dev_chunk.fill(S::Device::default());
                        continue;
                    }

                    let frames = dev_chunk.len() / stride;
                    let n = frames * channels;

                    let complete = pop_frames(&mut consumer, &mut in_block[..n], channels);
                    let status = block_status(&overflow, complete);
                    let stream_time = frames_done as f64 / sample_rate;
                    let res =
                        playhead.process(&mut out_block[..n], &in_block[..n], stream_time, status);
                    frames_done += frames as u64;

                    write_frames(dev_chunk, &out_block[..n], stride, offset, channels);

                    if res == CallbackResult::Stop {
                        finished = true;
                        let _ = term_tx.try_send(Termination::Finished);
                    }
                }
            },
            on_error,
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(format!("output: {e}")))
}

/// A running (or ready) duplex stream.
///
/// Keeps both cpal streams alive, dropping it closes them.
pub struct DuplexStream {
    input: Stream,
    output: Stream,
    sample_rate: u32,
    block_frames: u32,
    termination: Receiver<Termination>,
    running: bool,
}

impl DuplexStream {
    pub fn start(&mut self) -> AudioResult<()> {
        self.input
            .play()
            .map_err(|e| AudioError::StreamPlayError(format!("input: {e}")))?;
        self.output
            .play()
            .map_err(|e| AudioError::StreamPlayError(format!("output: {e}")))?;
        self.running = true;
        log::info!("duplex stream started");
        Ok(())
    }

    pub fn stop(&mut self) -> AudioResult<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        self.output
            .pause()
            .map_err(|e| AudioError::StreamPlayError(format!("output: {e}")))?;
        self.input
            .pause()
            .map_err(|e| AudioError::StreamPlayError(format!("input: {e}")))?;
        log::info!("duplex stream stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_frames(&self) -> u32 {
        self.block_frames
    }

    /// One block waiting in the ring plus the block being played.
    pub fn latency_frames(&self) -> u32 {
        2 * self.block_frames
    }

    pub fn latency_ms(&self) -> f32 {
        (self.latency_frames() as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Fires when the stream ended without being asked to.
    pub fn termination(&self) -> &Receiver<Termination> {
        &self.termination
    }
}

impl Drop for DuplexStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("closing duplex stream: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int24_travels_in_top_bytes() {
        let s = I24::new(-123_456);
        assert_eq!(s.to_device(), -123_456 << 8);
        assert_eq!(I24::from_device(s.to_device()), s);
        // the lowest byte is dropped
        assert_eq!(I24::from_device(0x7FFF_FFFF).get(), I24::MAX);
    }

    #[test]
    fn test_device_formats() {
        assert_eq!(device_format(SampleFormat::Int16), cpal::SampleFormat::I16);
        assert_eq!(device_format(SampleFormat::Int24), cpal::SampleFormat::I32);
        assert_eq!(device_format(SampleFormat::Float64), cpal::SampleFormat::F64);
    }

    #[test]
    fn test_buffer_ranges_intersect() {
        assert_eq!(intersect(Some((64, 4096)), Some((128, 8192))), Some((128, 4096)));
        assert_eq!(intersect(None, Some((32, 64))), Some((32, 64)));
        assert_eq!(intersect(None, None), None);
        assert_eq!(
            clamp_block_frames(16, intersect(Some((64, 4096)), Some((128, 8192)))),
            128
        );
    }

    // four stereo frames, left +1, right -1
    fn stereo_frames() -> Vec<f32> {
        [1.0, -1.0].repeat(4)
    }

    #[test]
    fn test_overflow_drops_whole_frames() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<f32>::new(5);

        // only two of the four frames fit
        assert!(!push_frames::<f32>(&mut producer, &stereo_frames(), 2, 0, 2));
        assert_eq!(consumer.slots(), 4);

        let mut block = [0.0_f32; 4];
        assert!(pop_frames(&mut consumer, &mut block, 2));
        assert_eq!(block, [1.0, -1.0, 1.0, -1.0]);

        // channels stay where they belong after the overflow
        assert!(!push_frames::<f32>(&mut producer, &stereo_frames(), 2, 0, 2));
        assert!(pop_frames(&mut consumer, &mut block, 2));
        assert_eq!(block, [1.0, -1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_underflow_fills_silence_and_keeps_alignment() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<f32>::new(16);
        assert!(push_frames::<f32>(&mut producer, &[1.0, -1.0], 2, 0, 2));

        let mut block = [9.0_f32; 6];
        assert!(!pop_frames(&mut consumer, &mut block, 2));
        assert_eq!(block, [1.0, -1.0, 0.0, 0.0, 0.0, 0.0]);

        // the producer catches up, the next block is complete and aligned
        assert!(push_frames::<f32>(&mut producer, &stereo_frames()[..6], 2, 0, 2));
        assert!(pop_frames(&mut consumer, &mut block, 2));
        assert_eq!(block, [1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_partial_frame_is_left_in_the_ring() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<f32>::new(8);
        for s in [1.0, -1.0, 1.0] {
            producer.push(s).unwrap();
        }

        let mut block = [0.0_f32; 4];
        assert!(!pop_frames(&mut consumer, &mut block, 2));
        assert_eq!(block, [1.0, -1.0, 0.0, 0.0]);
        assert_eq!(consumer.slots(), 1);
    }

    #[test]
    fn test_status_takes_overflow_once() {
        let overflow = AtomicBool::new(true);

        let status = block_status(&overflow, false);
        assert!(status.input_overflow);
        assert!(status.output_underflow);

        assert_eq!(block_status(&overflow, true), StreamStatus::CLEAN);
    }

    #[test]
    fn test_input_offset_is_stripped() {
        let (mut producer, mut consumer) = rtrb::RingBuffer::<i16>::new(8);
        // four device channels, channels 1 and 2 are used
        let data: [i16; 8] = [0, 1, 2, 3, 10, 11, 12, 13];
        assert!(push_frames::<i16>(&mut producer, &data, 4, 1, 2));

        let mut block = [0_i16; 4];
        assert!(pop_frames(&mut consumer, &mut block, 2));
        assert_eq!(block, [1, 2, 11, 12]);
    }

    #[test]
    fn test_output_offset_leaves_other_channels_silent() {
        let mut dev = [7_i32; 6];
        let samples = [I24::new(1), I24::new(2), I24::new(3), I24::new(4)];

        // three device channels, the pair starts at channel 1
        write_frames::<I24>(&mut dev, &samples, 3, 1, 2);
        assert_eq!(dev, [0, 1 << 8, 2 << 8, 0, 3 << 8, 4 << 8]);
    }
}
