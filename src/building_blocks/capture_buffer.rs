use crate::building_blocks::sample_format::Sample;

/// Fixed-capacity recording buffer, filled front to back.
/// Pre-allocated, never grows. Once full (or frozen), further
/// samples are dropped without complaint.
pub struct CaptureBuffer<S: Sample> {
    samples: Box<[S]>,
    cursor: usize,
    frozen: bool,
}

impl<S: Sample> CaptureBuffer<S> {
    pub fn with_capacity(capacity: usize) -> Self {
        CaptureBuffer {
            samples: vec![S::default(); capacity].into_boxed_slice(),
            cursor: 0,
            frozen: false,
        }
    }

    /// room for `seconds` of interleaved audio
    pub fn for_duration(sample_rate: u32, channels: u16, seconds: f64) -> Self {
        let capacity = (sample_rate as f64 * seconds).round().max(0.0) as usize * channels as usize;
        Self::with_capacity(capacity)
    }

    /// Copy as much of `block` as still fits, return how many samples were taken.
    /// Called from the audio callback, so no allocation and no locking here.
    #[inline]
    pub fn append(&mut self, block: &[S]) -> usize {
        if self.frozen {
            return 0;
        }
        let count = block.len().min(self.remaining());
        self.samples[self.cursor..self.cursor + count].copy_from_slice(&block[..count]);
        self.cursor += count;
        count
    }

    /// stop recording for good, later appends write nothing
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// the samples recorded so far
    pub fn written(&self) -> &[S] {
        &self.samples[..self.cursor]
    }

    /// Hand out the recorded samples, leaving an empty, frozen buffer behind.
    /// Only meant to be called once the stream has stopped.
    pub fn drain(&mut self) -> Vec<S> {
        let mut samples = std::mem::take(&mut self.samples).into_vec();
        samples.truncate(self.cursor);
        self.cursor = 0;
        self.frozen = true;
        samples
    }

    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.cursor
    }

    pub fn is_full(&self) -> bool {
        self.cursor == self.samples.len()
    }
}
