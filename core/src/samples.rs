//! Sample store and the high-pass recovery filter
//!
//! The store owns the recording as captured plus any filtered variants the
//! decoder asked for while retrying. Variants are always derived from the
//! original buffer, never from another variant, and are cached by cutoff.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::rc::Rc;

/// Immutable sample sequence shared between the store and the scanner
pub type SampleBuffer = Rc<[i16]>;

/// Single-pole high-pass filter over `input`.
///
/// `y[0] = x[0]`, `y[i] = a * (y[i-1] + x[i] - x[i+1])` for `1 <= i < N-1`,
/// with `a = rc / (rc + 1/fs)` and `rc = 1 / (2 * pi * fc)`. The last sample
/// is left at zero. A cutoff of 0 returns the input unchanged.
pub fn high_pass(input: &[i16], cutoff_hz: u32, sample_rate: u32) -> Vec<i16> {
    if cutoff_hz == 0 || input.is_empty() {
        return input.to_vec();
    }

    let rc = 1.0 / (2.0 * PI * cutoff_hz as f64);
    let a = rc / (rc + 1.0 / sample_rate as f64);

    let mut output = vec![0i16; input.len()];
    output[0] = input[0];
    for i in 1..input.len().saturating_sub(1) {
        let y = a * (output[i - 1] as f64 + input[i] as f64 - input[i + 1] as f64);
        output[i] = y as i16;
    }
    output
}

/// Original samples of one recording and their cached filtered variants
pub struct SampleStore {
    original: SampleBuffer,
    sample_rate: u32,
    filtered: HashMap<u32, SampleBuffer>,
}

impl SampleStore {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            original: samples.into(),
            sample_rate,
            filtered: HashMap::new(),
        }
    }

    pub fn original(&self) -> SampleBuffer {
        Rc::clone(&self.original)
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Buffer for the given cutoff, computing and caching it on first use
    pub fn select(&mut self, cutoff_hz: u32) -> SampleBuffer {
        if cutoff_hz == 0 {
            return self.original();
        }

        let original = &self.original;
        let sample_rate = self.sample_rate;
        let buffer = self.filtered.entry(cutoff_hz).or_insert_with(|| {
            log::debug!("Computing {} Hz high-pass variant", cutoff_hz);
            high_pass(original, cutoff_hz, sample_rate).into()
        });
        Rc::clone(buffer)
    }

    /// Number of filtered variants computed so far
    pub fn cached_variants(&self) -> usize {
        self.filtered.len()
    }
}
