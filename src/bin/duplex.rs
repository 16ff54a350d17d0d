//! duplex - pass audio through, convolve a copy, record both

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{select, Receiver};

use duplex_convolver::audio::{self, DeviceSample, StreamRequest, Termination};
use duplex_convolver::building_blocks::impulse_response;
use duplex_convolver::config::{
    DEFAULT_BLOCK_FRAMES, DEFAULT_IMPULSE_RESPONSE_PATH, DEFAULT_INPUT_DUMP_PATH,
    DEFAULT_OUTPUT_DUMP_PATH, DEFAULT_RECORDING_SECONDS,
};
use duplex_convolver::{ImpulseResponse, SampleFormat, SessionConfig, StreamSession, I24};

/// Pass the input straight to the output, convolve a copy of it with an
/// impulse response and record both to disk.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of channels, used on both sides
    #[arg(required_unless_present = "list_devices")]
    channels: Option<u16>,

    /// Sample rate in Hz
    #[arg(required_unless_present = "list_devices")]
    fs: Option<u32>,

    /// Input device (0 = default, see --list-devices)
    #[arg(default_value_t = 0)]
    i_device: usize,

    /// Output device (0 = default, see --list-devices)
    #[arg(default_value_t = 0)]
    o_device: usize,

    /// First input channel to read
    #[arg(default_value_t = 0)]
    i_channel_offset: u16,

    /// First output channel to write
    #[arg(default_value_t = 0)]
    o_channel_offset: u16,

    /// Impulse response, raw little-endian f64
    #[arg(long, default_value = DEFAULT_IMPULSE_RESPONSE_PATH)]
    impulse_response: PathBuf,

    /// Sample format on the device and in the dump files
    #[arg(long, default_value_t = SampleFormat::Float64)]
    format: SampleFormat,

    /// Requested frames per block
    #[arg(long, default_value_t = DEFAULT_BLOCK_FRAMES)]
    block_frames: u32,

    /// Seconds of audio to record
    #[arg(long, default_value_t = DEFAULT_RECORDING_SECONDS)]
    seconds: f64,

    /// Where the raw input goes
    #[arg(long, default_value = DEFAULT_INPUT_DUMP_PATH)]
    input_dump: PathBuf,

    /// Where the convolved signal goes
    #[arg(long, default_value = DEFAULT_OUTPUT_DUMP_PATH)]
    output_dump: PathBuf,

    /// End the stream once both recordings are full
    #[arg(long)]
    stop_when_full: bool,

    /// Print the available devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn stream_request(&self) -> Option<StreamRequest> {
        Some(
            StreamRequest::new(self.channels?, self.fs?)
                .with_block_frames(self.block_frames)
                .with_devices(self.i_device, self.o_device)
                .with_offsets(self.i_channel_offset, self.o_channel_offset)
                .with_format(self.format),
        )
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_recording_seconds(self.seconds)
            .with_impulse_response(&self.impulse_response)
            .with_dump_paths(&self.input_dump, &self.output_dump)
            .with_stop_when_full(self.stop_when_full)
    }
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    if args.list_devices {
        for device in audio::list_devices().context("listing audio devices")? {
            println!("{device}");
        }
        return Ok(());
    }

    let request = args
        .stream_request()
        .context("channels and sample rate are required")?;
    let config = args.session_config();

    if args.seconds <= 0.0 {
        anyhow::bail!("recording length must be positive, got {} s", args.seconds);
    }

    let ir = impulse_response::load(&config.impulse_response_path).with_context(|| {
        format!(
            "loading impulse response from {}",
            config.impulse_response_path.display()
        )
    })?;

    match request.format {
        SampleFormat::Int16 => run::<i16>(&request, config, ir),
        SampleFormat::Int24 => run::<I24>(&request, config, ir),
        SampleFormat::Int32 => run::<i32>(&request, config, ir),
        SampleFormat::Float32 => run::<f32>(&request, config, ir),
        SampleFormat::Float64 => run::<f64>(&request, config, ir),
    }
}

fn run<S: DeviceSample>(
    request: &StreamRequest,
    config: SessionConfig,
    ir: ImpulseResponse,
) -> Result<()> {
    let negotiated = audio::negotiate(request).context("negotiating the duplex stream")?;
    let session = StreamSession::<S>::new(config, ir, negotiated.shape());
    let reporter = session
        .controls()
        .spawn_reporter(Duration::from_millis(50))
        .context("starting the reporter thread")?;

    let mut stream = negotiated
        .open(session.playhead())
        .context("opening the duplex stream")?;

    println!(
        "Stream latency: {} frames ({:.1} ms)",
        stream.latency_frames(),
        stream.latency_ms()
    );

    stream.start().context("starting the duplex stream")?;
    println!("Running ... press <enter> to quit.");

    match wait_for_end(stream.termination()) {
        Some(Termination::Finished) => log::info!("recordings are full, stopping"),
        Some(Termination::DeviceLost) => log::error!("audio device lost, stopping"),
        None => log::info!("stopping on request"),
    }

    // the stream is closed here whatever happens to the dump
    let stopped = stream.stop();
    drop(stream);
    reporter.stop();
    stopped.context("stopping the duplex stream")?;

    let report = session.finish().context("writing the recordings")?;
    println!(
        "Wrote {} samples to {} and {} samples to {}",
        report.input.samples,
        report.input.path.display(),
        report.processed.samples,
        report.processed.path.display()
    );

    let c = report.counters;
    log::info!(
        "{} blocks, {} xruns, {} overruns, {} dropped events, {} skipped blocks, {} device errors",
        c.blocks,
        c.xruns,
        c.overruns,
        c.dropped_events,
        c.contended,
        c.device_errors
    );

    Ok(())
}

// None means the user pressed enter
fn wait_for_end(termination: &Receiver<Termination>) -> Option<Termination> {
    let (enter_tx, enter_rx) = crossbeam::channel::bounded::<()>(1);
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let mut line = String::new();
            // EOF counts as enter
            let _ = std::io::stdin().lock().read_line(&mut line);
            let _ = enter_tx.send(());
        });

    if let Err(e) = spawned {
        log::warn!("can't watch stdin ({e}), running until the stream ends");
        return termination.recv().ok();
    }

    select! {
        recv(enter_rx) -> _ => None,
        recv(termination) -> t => t.ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_positional_defaults() {
        let args = Args::try_parse_from(["duplex", "2", "44100"]).unwrap();
        let req = args.stream_request().unwrap();

        assert_eq!(req.channels, 2);
        assert_eq!(req.sample_rate, 44100);
        assert_eq!(req.input_device, 0);
        assert_eq!(req.output_offset, 0);
        assert_eq!(req.format, SampleFormat::Float64);

        let config = args.session_config();
        assert_eq!(config.input_dump_path, PathBuf::from("dumpInput.bin"));
        assert_eq!(config.recording_seconds, 10.0);
    }

    #[test]
    fn test_all_positionals_and_flags() {
        let args = Args::try_parse_from([
            "duplex",
            "1",
            "48000",
            "3",
            "4",
            "1",
            "2",
            "--format",
            "int24",
            "--block-frames",
            "256",
            "--seconds",
            "2.5",
            "--stop-when-full",
        ])
        .unwrap();
        let req = args.stream_request().unwrap();

        assert_eq!((req.input_device, req.output_device), (3, 4));
        assert_eq!((req.input_offset, req.output_offset), (1, 2));
        assert_eq!(req.format, SampleFormat::Int24);
        assert_eq!(req.block_frames, 256);
        assert!(args.session_config().stop_when_full);
    }

    #[test]
    fn test_missing_arguments_rejected() {
        assert!(Args::try_parse_from(["duplex"]).is_err());
        assert!(Args::try_parse_from(["duplex", "2"]).is_err());
        assert!(Args::try_parse_from(["duplex", "two", "44100"]).is_err());
        assert!(Args::try_parse_from(["duplex", "2", "44100", "--format", "int8"]).is_err());
    }

    #[test]
    fn test_list_devices_needs_nothing_else() {
        let args = Args::try_parse_from(["duplex", "--list-devices"]).unwrap();
        assert!(args.list_devices);
        assert!(args.stream_request().is_none());
    }
}
