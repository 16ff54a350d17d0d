use crate::building_blocks::impulse_response::ImpulseResponse;

/**
 * A direct-form block convolver.
 * Uses the Overlap-Add method for block convolution: each block's
 * contribution is summed into an accumulator that still holds the
 * tail of all previous blocks, the first part of the accumulator
 * is final and leaves as output, the rest moves down for the next block.
 *
 * All state is allocated up front, `process` never allocates.
 */
pub struct TimeDomainConvolver {
    ir: ImpulseResponse,
    // L + B - 1 slots, the first L - 1 hold the carried tail between calls
    accumulator: Vec<f64>,
    block_size: usize,
}

impl TimeDomainConvolver {
    /// `block_size` is the largest block (in interleaved samples)
    /// `process` will ever see
    pub fn new(ir: ImpulseResponse, block_size: usize) -> Self {
        let accumulator = if ir.is_empty() {
            Vec::new()
        } else {
            vec![0.0; ir.len() + block_size - 1]
        };

        TimeDomainConvolver {
            ir,
            accumulator,
            block_size,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn impulse_response(&self) -> &ImpulseResponse {
        &self.ir
    }

    /// number of samples a block keeps ringing into the following blocks
    pub fn tail_len(&self) -> usize {
        self.ir.len().saturating_sub(1)
    }

    /// forget the carried tail
    pub fn reset(&mut self) {
        self.accumulator.fill(0.0);
    }

    /// Convolve one block. `output` receives as many samples as `input` holds.
    ///
    /// # Panics
    ///
    /// If `input` is longer than the block size or `output` is shorter than `input`.
    pub fn process(&mut self, input: &[f64], output: &mut [f64]) {
        let n = input.len();
        assert!(n <= self.block_size, "block of {n} exceeds {}", self.block_size);

        let output = &mut output[..n];

        // degenerate filter, nothing ever comes out
        if self.ir.is_empty() {
            output.fill(0.0);
            return;
        }

        let ir = self.ir.as_slice();

        // add this block's contribution on top of the carried tail
        for (k, &x) in input.iter().enumerate() {
            for (acc, &h) in self.accumulator[k..k + ir.len()].iter_mut().zip(ir) {
                *acc += x * h;
            }
        }

        // nothing after this block reaches the first n slots anymore
        output.copy_from_slice(&self.accumulator[..n]);

        // move the tail down, clear what's been vacated
        let len = self.accumulator.len();
        self.accumulator.copy_within(n.., 0);
        self.accumulator[len - n..].fill(0.0);
    }
}

// TEST TEST TEST
#[cfg(test)]
mod tests {
    // Note this useful idiom: importing names from outer (for mod tests) scope.
    use super::*;
    use std::f64::consts::PI;

    // plain full-length convolution as reference
    fn convolve_direct(signal: &[f64], ir: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; signal.len() + ir.len() - 1];
        for (k, x) in signal.iter().enumerate() {
            for (j, h) in ir.iter().enumerate() {
                out[k + j] += x * h;
            }
        }
        out
    }

    fn run_blocks(conv: &mut TimeDomainConvolver, signal: &[f64], block: usize) -> Vec<f64> {
        let mut result = Vec::new();
        let mut out = vec![0.0; block];
        for chunk in signal.chunks(block) {
            conv.process(chunk, &mut out);
            result.extend_from_slice(&out[..chunk.len()]);
        }
        result
    }

    #[test]
    fn test_unit_impulse_response_is_identity() {
        let mut conv = TimeDomainConvolver::new(ImpulseResponse::unit(), 128);

        let mut signal_in = [0.0; 128];
        let mut signal_out = [0.0; 128];

        for b in 0..100 {
            for i in 0..128 {
                let pi_idx = ((b * 128 + i) as f64) * PI;
                signal_in[i] = ((220.0 / 44100.0) * pi_idx).sin();
                signal_in[i] += ((432.0 / 44100.0) * pi_idx).sin();
                signal_in[i] += ((648.0 / 44100.0) * pi_idx).sin();
            }
            conv.process(&signal_in, &mut signal_out);
            assert_eq!(signal_in, signal_out);
        }
    }

    #[test]
    fn test_two_tap_example() {
        let ir = ImpulseResponse::from_coefficients(vec![1.0, 0.5]);
        let mut conv = TimeDomainConvolver::new(ir, 4);
        let mut out = [0.0; 4];

        conv.process(&[1.0, 0.0, 0.0, 0.0], &mut out);
        assert_eq!(out, [1.0, 0.5, 0.0, 0.0]);

        conv.process(&[0.0; 4], &mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_tail_crosses_block_boundary() {
        let ir = ImpulseResponse::from_coefficients(vec![1.0, 0.5]);
        let mut conv = TimeDomainConvolver::new(ir, 4);
        let mut out = [0.0; 4];

        conv.process(&[0.0, 0.0, 0.0, 1.0], &mut out);
        assert_eq!(out, [0.0, 0.0, 0.0, 1.0]);

        // the second tap lands in the next block
        conv.process(&[0.0; 4], &mut out);
        assert_eq!(out, [0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_long_impulse_response_comes_out_intact() {
        let coefficients: Vec<f64> = (0..37).map(|i| 1.0 / (i as f64 + 1.0)).collect();
        let ir = ImpulseResponse::from_coefficients(coefficients.clone());
        let mut conv = TimeDomainConvolver::new(ir, 8);

        let mut signal = vec![0.0; 40];
        signal[0] = 1.0;
        let out = run_blocks(&mut conv, &signal, 8);

        // ceil(37 / 8) = 5 blocks carry the whole response
        for (i, c) in coefficients.iter().enumerate() {
            assert_eq!(out[i], *c, "coefficient {i}");
        }
        for s in &out[37..] {
            assert_eq!(*s, 0.0);
        }
    }

    #[test]
    fn test_matches_direct_convolution() {
        fastrand::seed(23);
        let ir: Vec<f64> = (0..300).map(|_| fastrand::f64() * 2.0 - 1.0).collect();
        let mut signal: Vec<f64> = (0..4096).map(|_| fastrand::f64() * 2.0 - 1.0).collect();
        // flush the tail out with silence
        signal.extend(std::iter::repeat(0.0).take(ir.len()));

        let reference = convolve_direct(&signal, &ir);

        for block in [1, 64, 100, 512] {
            let mut conv =
                TimeDomainConvolver::new(ImpulseResponse::from_coefficients(ir.clone()), block);
            let out = run_blocks(&mut conv, &signal, block);
            for (a, b) in out.iter().zip(reference.iter()) {
                assert_approx_eq::assert_approx_eq!(*a, *b, 1e-9);
            }
        }
    }

    #[test]
    fn test_short_blocks_keep_the_carry() {
        fastrand::seed(5);
        let ir: Vec<f64> = (0..50).map(|_| fastrand::f64()).collect();
        let signal: Vec<f64> = (0..1000).map(|_| fastrand::f64() - 0.5).collect();
        let reference = convolve_direct(&signal, &ir);

        let mut conv = TimeDomainConvolver::new(ImpulseResponse::from_coefficients(ir), 64);
        let mut out = vec![0.0; 64];
        let mut result = Vec::new();
        let mut pos = 0;
        while pos < signal.len() {
            // irregular block lengths, as a driver might deliver them
            let n = (1 + fastrand::usize(..64)).min(signal.len() - pos);
            conv.process(&signal[pos..pos + n], &mut out);
            result.extend_from_slice(&out[..n]);
            pos += n;
        }

        for (a, b) in result.iter().zip(reference.iter()) {
            assert_approx_eq::assert_approx_eq!(*a, *b, 1e-9);
        }
    }

    #[test]
    fn test_output_is_not_clipped() {
        let ir = ImpulseResponse::from_coefficients(vec![2.0, 2.0]);
        let mut conv = TimeDomainConvolver::new(ir, 2);
        let mut out = [0.0; 2];

        conv.process(&[1.0, 1.0], &mut out);
        assert_eq!(out, [2.0, 4.0]);
    }

    #[test]
    fn test_silent_samples_go_through_the_full_sum() {
        // 0 * inf only shows up if zeros are multiplied like any other sample
        let ir = ImpulseResponse::from_coefficients(vec![1.0, f64::INFINITY]);
        let mut conv = TimeDomainConvolver::new(ir, 4);
        let mut out = [0.0; 4];

        conv.process(&[1.0, 0.0, 0.0, 0.0], &mut out);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], f64::INFINITY);
        assert!(out[2].is_nan());
        assert!(out[3].is_nan());
    }

    #[test]
    fn test_empty_impulse_response_gives_silence() {
        let ir = ImpulseResponse::from_coefficients(Vec::new());
        let mut conv = TimeDomainConvolver::new(ir, 4);
        let mut out = [1.0; 4];

        conv.process(&[1.0, 2.0, 3.0, 4.0], &mut out);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(conv.tail_len(), 0);
    }

    #[test]
    fn test_reset_drops_the_tail() {
        let ir = ImpulseResponse::from_coefficients(vec![1.0, 1.0, 1.0]);
        let mut conv = TimeDomainConvolver::new(ir, 2);
        let mut out = [0.0; 2];

        conv.process(&[1.0, 1.0], &mut out);
        conv.reset();
        conv.process(&[0.0, 0.0], &mut out);
        assert_eq!(out, [0.0, 0.0]);
    }
}
