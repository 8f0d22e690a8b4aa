use std::f64::consts::PI;

use crate::error::Result;
use crate::wav;

/// Renders pages as a Studybox-style flux signal.
///
/// This is the inverse of the decoder: each page becomes a lead-in of zero
/// bits, the track start marker, then every payload byte as a 0 framing bit
/// followed by 8 data bits MSB first. Bits are turned into clock gaps with the
/// same modified FM table the decoder reads, and each clock becomes an
/// alternating peak or valley joined by half-cosine slopes.
#[derive(Debug, Clone)]
pub struct Encoder {
    amplitude: f64,
    lead_in_zeros: usize,
    short_gap: usize,
    medium_gap: usize,
    long_gap: usize,
    silence: usize,
    ramp: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            amplitude: 12000.0,
            lead_in_zeros: 32,
            short_gap: 9,
            medium_gap: 13,
            long_gap: 18,
            silence: 2000,
            ramp: 9,
        }
    }

    /// Samples of silence before, between and after pages
    pub fn with_silence(mut self, samples: usize) -> Self {
        self.silence = samples;
        self
    }

    pub fn with_lead_in(mut self, zeros: usize) -> Self {
        self.lead_in_zeros = zeros;
        self
    }

    /// Gap lengths used for short, medium and long cells
    pub fn gaps(&self) -> (usize, usize, usize) {
        (self.short_gap, self.medium_gap, self.long_gap)
    }

    /// Bit stream for one page, lead-in included
    pub fn page_bits(&self, payload: &[u8]) -> Vec<u8> {
        let mut bits = vec![0u8; self.lead_in_zeros];
        bits.push(1);
        for &byte in payload {
            bits.push(0);
            bits.extend((0..8).rev().map(|shift| (byte >> shift) & 1));
        }
        bits
    }

    /// Clock gaps for a bit stream, starting after a 0.
    ///
    /// A dangling 0 after a 1 at the end of the stream is padded with
    /// another 0.
    pub fn cell_gaps(&self, bits: &[u8]) -> Vec<usize> {
        let mut gaps = Vec::with_capacity(bits.len());
        let mut prev = 0u8;
        let mut i = 0;

        while i < bits.len() {
            match (prev, bits[i]) {
                (0, 0) => {
                    gaps.push(self.short_gap);
                    i += 1;
                }
                (0, _) => {
                    gaps.push(self.medium_gap);
                    prev = 1;
                    i += 1;
                }
                (_, 1) => {
                    gaps.push(self.short_gap);
                    i += 1;
                }
                (_, _) => {
                    if bits.get(i + 1) == Some(&1) {
                        gaps.push(self.long_gap);
                    } else {
                        gaps.push(self.medium_gap);
                        prev = 0;
                    }
                    i += 2;
                }
            }
        }
        gaps
    }

    /// Signal for a sequence of pages
    pub fn encode(&self, pages: &[Vec<u8>]) -> Vec<i16> {
        let gaps: Vec<Vec<usize>> = pages
            .iter()
            .map(|payload| self.cell_gaps(&self.page_bits(payload)))
            .collect();
        self.encode_gaps(&gaps)
    }

    /// Signal for pages given directly as clock gaps. The first clock of
    /// every page is placed after the silence; each gap adds one more clock.
    pub fn encode_gaps(&self, pages: &[Vec<usize>]) -> Vec<i16> {
        let mut out = vec![0i16; self.silence];
        let mut polarity = 1.0;
        for gaps in pages {
            polarity = self.render_page(&mut out, gaps, polarity);
            out.extend(std::iter::repeat(0).take(self.silence));
        }
        out
    }

    /// 16-bit stereo WAV image with the signal on both channels
    pub fn encode_wav(&self, pages: &[Vec<u8>]) -> Result<Vec<u8>> {
        let signal = self.encode(pages);
        wav::stereo_wav(&signal, &signal)
    }

    /// Returns the polarity the next page should start with
    fn render_page(&self, out: &mut Vec<i16>, gaps: &[usize], polarity: f64) -> f64 {
        let ramp = self.ramp as f64;
        let mut level = polarity * self.amplitude;

        for k in 0..self.ramp {
            let x = (1.0 - (PI * k as f64 / ramp).cos()) / 2.0;
            out.push((level * x) as i16);
        }

        for &gap in gaps {
            for k in 0..gap {
                out.push((level * (PI * k as f64 / gap as f64).cos()) as i16);
            }
            level = -level;
        }

        for k in 0..=self.ramp {
            let x = (1.0 + (PI * k as f64 / ramp).cos()) / 2.0;
            out.push((level * x) as i16);
        }

        -level.signum()
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
