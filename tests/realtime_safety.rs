//! Nothing on the audio path may allocate.

use assert_no_alloc::*;

use duplex_convolver::building_blocks::TimeDomainConvolver;
use duplex_convolver::{
    init_duplex, CallbackResult, ImpulseResponse, SessionConfig, SharedPlayhead, StreamShape,
    StreamStatus, I24,
};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

fn shape() -> StreamShape {
    StreamShape {
        sample_rate: 48000,
        channels: 2,
        block_frames: 128,
    }
}

fn ir() -> ImpulseResponse {
    ImpulseResponse::from_coefficients((0..300).map(|i| 0.99_f64.powi(i) * 0.1).collect())
}

#[test]
fn convolver_process_does_not_allocate() {
    let mut conv = TimeDomainConvolver::new(ir(), 256);
    let input = vec![0.25; 256];
    let mut output = vec![0.0; 256];

    assert_no_alloc(|| {
        for _ in 0..20 {
            conv.process(&input, &mut output);
            conv.process(&input[..100], &mut output[..100]);
        }
    });
}

#[test]
fn playhead_process_does_not_allocate() {
    let config = SessionConfig::default().with_recording_seconds(0.1);
    let (controls, mut playhead) = init_duplex::<f32>(&config, ir(), &shape());

    let input = vec![0.5_f32; 256];
    let mut output = vec![0.0_f32; 256];
    let status = StreamStatus {
        input_overflow: true,
        output_underflow: false,
    };

    assert_no_alloc(|| {
        // runs past the point where both captures are full
        for b in 0..40 {
            playhead.process(&mut output, &input, b as f64 * 0.00267, status);
        }
    });

    assert_eq!(output, input);
    assert_eq!(controls.counters().blocks, 40);
    assert!(playhead.input_capture().is_full());
}

#[test]
fn shared_playhead_does_not_allocate() {
    let config = SessionConfig::default()
        .with_recording_seconds(0.02)
        .with_stop_when_full(true);
    let (_controls, playhead) = init_duplex::<I24>(&config, ir(), &shape());
    let shared = SharedPlayhead::new(playhead);

    let input = vec![I24::new(1000); 256];
    let mut output = vec![I24::default(); 256];
    let mut stopped = false;

    assert_no_alloc(|| {
        for _ in 0..10 {
            if shared.process(&mut output, &input, 0.0, StreamStatus::CLEAN)
                == CallbackResult::Stop
            {
                stopped = true;
            }
        }
    });

    assert!(stopped);
}
