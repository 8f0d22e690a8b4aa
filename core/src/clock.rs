//! Flux transition (clock) detection
//!
//! A clock is a sample that sits at least `amplitude_threshold` above (or
//! below) both of its probes `probe_distance` samples away and forms a clean
//! local peak (or valley): equal-or-greater than its neighbours, with the
//! neighbours themselves still climbing towards it.

use crate::config::DecoderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockEdge {
    #[default]
    None,
    /// Local peak
    Rising,
    /// Local valley
    Falling,
}

/// Stateless clock predicate over a sample buffer
#[derive(Debug, Clone, Copy)]
pub struct ClockDetector {
    threshold: i32,
    probe: usize,
}

impl ClockDetector {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            threshold: config.amplitude_threshold,
            probe: config.probe_distance.max(2),
        }
    }

    /// Indices that can be classified without reading out of bounds
    pub fn scan_range(&self, len: usize) -> std::ops::Range<usize> {
        self.probe..len.saturating_sub(self.probe).max(self.probe)
    }

    /// Classify sample `i`. Indices outside `scan_range` are never clocks.
    pub fn classify(&self, samples: &[i16], i: usize) -> ClockEdge {
        if i < self.probe || i + self.probe >= samples.len() {
            return ClockEdge::None;
        }

        let here = samples[i] as i32;
        let before = here - samples[i - self.probe] as i32;
        let after = here - samples[i + self.probe] as i32;

        if before.abs() < self.threshold || after.abs() < self.threshold {
            return ClockEdge::None;
        }
        if before.signum() != after.signum() {
            return ClockEdge::None;
        }

        let (s2, s1, s0, n1, n2) = (
            samples[i - 2],
            samples[i - 1],
            samples[i],
            samples[i + 1],
            samples[i + 2],
        );

        if s0 >= s1 && s0 >= n1 && s1 > s2 && n1 > n2 {
            ClockEdge::Rising
        } else if s0 <= s1 && s0 <= n1 && s1 < s2 && n1 < n2 {
            ClockEdge::Falling
        } else {
            ClockEdge::None
        }
    }

    /// Every clock in `samples`, with same-direction repeats collapsed.
    ///
    /// No gap filtering is applied; this is the raw edge stream the bit
    /// timing machine starts from.
    pub fn edges(&self, samples: &[i16]) -> Vec<(usize, ClockEdge)> {
        let mut debounce = Debounce::default();
        self.scan_range(samples.len())
            .filter_map(|i| {
                let edge = self.classify(samples, i);
                if debounce.is_repeat(edge) {
                    return None;
                }
                debounce.accept(edge);
                Some((i, edge))
            })
            .collect()
    }
}

/// Remembers the direction of the last accepted clock so a second clock in
/// the same direction can be dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Debounce {
    last: ClockEdge,
}

impl Debounce {
    /// True for `None` and for a repeat of the last accepted direction
    pub fn is_repeat(&self, edge: ClockEdge) -> bool {
        edge == ClockEdge::None || edge == self.last
    }

    pub fn accept(&mut self, edge: ClockEdge) {
        self.last = edge;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn detector() -> ClockDetector {
        ClockDetector::new(&DecoderConfig::default())
    }

    #[test]
    fn test_clean_peak_and_valley() {
        let peak = [0, 0, 3000, 6000, 8000, 6000, 3000, 0, 0];
        assert_eq!(detector().classify(&peak, 4), ClockEdge::Rising);

        let valley: Vec<i16> = peak.iter().map(|s| -s).collect();
        assert_eq!(detector().classify(&valley, 4), ClockEdge::Falling);
    }

    #[test]
    fn test_flat_top_is_still_a_peak() {
        // s[i] == s[i+1] is allowed, but the shoulders must be strictly lower
        let samples = [0, 0, 3000, 6000, 8000, 8000, 5000, 0, 0];
        assert_eq!(detector().classify(&samples, 4), ClockEdge::Rising);
        assert_eq!(detector().classify(&samples, 5), ClockEdge::Rising);
    }

    #[test]
    fn test_small_swing_rejected() {
        let samples = [0, 0, 100, 300, 499, 300, 100, 0, 0];
        assert_eq!(detector().classify(&samples, 4), ClockEdge::None);
    }

    #[test]
    fn test_one_sided_swing_rejected() {
        // Big step up, no drop afterwards
        let samples = [0, 0, 3000, 6000, 8000, 7900, 7800, 7700, 7600];
        assert_eq!(detector().classify(&samples, 4), ClockEdge::None);
    }

    #[test]
    fn test_boundaries_never_clock() {
        let samples = [8000, 0, 0, 0, 8000, 0, 0, 0];
        assert_eq!(detector().classify(&samples, 0), ClockEdge::None);
        assert_eq!(detector().classify(&samples, 2), ClockEdge::None);
        assert_eq!(detector().classify(&samples, 5), ClockEdge::None);
        assert_eq!(detector().classify(&samples, 100), ClockEdge::None);
    }

    #[test]
    fn test_low_amplitude_noise_has_no_clocks() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let samples: Vec<i16> = (0..20_000).map(|_| rng.gen_range(-249..=249)).collect();
        assert!(detector().edges(&samples).is_empty());
    }

    #[test]
    fn test_repeated_direction_collapses() {
        // Two peaks separated by a flat floor, so no valley between them
        let mut samples = vec![0i16; 4];
        samples.extend_from_slice(&[3000, 6000, 8000, 6000, 3000, 0]);
        samples.extend_from_slice(&[0, 0, 0]);
        samples.extend_from_slice(&[3000, 6000, 8000, 6000, 3000, 0]);
        samples.extend_from_slice(&[0, 0, 0]);

        let edges = detector().edges(&samples);
        assert_eq!(edges, vec![(6, ClockEdge::Rising)]);
    }

    #[test]
    fn test_alternating_edges_kept() {
        let samples = [
            0, 0, 0, 3000, 6000, 8000, 6000, 3000, 0, -3000, -6000, -8000, -6000, -3000, 0, 0,
            0,
        ];
        let edges = detector().edges(&samples);
        assert_eq!(
            edges,
            vec![(5, ClockEdge::Rising), (11, ClockEdge::Falling)]
        );
    }
}
