//! Gap timing to bit stream
//!
//! The tape uses a modified FM code: the spacing between two accepted clocks
//! together with the previously emitted bit decides what comes next.
//!
//! | previous bit | short (6..=11) | medium (12..=15) | long (16..=20) |
//! |--------------|----------------|------------------|----------------|
//! | 1            | 1              | 0 0              | 0 1            |
//! | 0            | 0              | 1                | illegal        |
//!
//! Before a track starts only the length of the zero run is tracked. The
//! first medium cell after more than `lead_in_min_zeros` zeros is the track
//! start marker; from then on bits flow into the byte assembler.

use crate::assembler::ByteAssembler;
use crate::config::DecoderConfig;
use crate::error::PageFault;

/// Band a clock-to-clock gap falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapClass {
    /// Closer than `min_clock_gap`: noise around one transition
    Spurious,
    /// A bit cell
    Cell(CellLength),
    /// Too long for a cell, too short for a page break
    Oversized,
    /// Signal lost for a while; ends the page
    SyncLoss,
    /// Silence between pages
    HardBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLength {
    Short,
    Medium,
    Long,
}

pub fn classify_gap(gap: usize, config: &DecoderConfig) -> GapClass {
    if gap < config.min_clock_gap {
        GapClass::Spurious
    } else if gap <= config.short_cell_max {
        GapClass::Cell(CellLength::Short)
    } else if gap <= config.medium_cell_max {
        GapClass::Cell(CellLength::Medium)
    } else if gap <= config.cell_max {
        GapClass::Cell(CellLength::Long)
    } else if gap <= config.sync_loss_gap {
        GapClass::Oversized
    } else if gap <= config.hard_boundary_gap {
        GapClass::SyncLoss
    } else {
        GapClass::HardBoundary
    }
}

/// What the decode session has to do after a clock was processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockOutcome {
    Continue,
    /// The lead-in was confirmed and data starts here
    TrackStart,
    /// The page is damaged; keep scanning
    PageInvalid(PageFault),
    /// The current page ends here
    PageBoundary { hard: bool },
}

/// Everything decoded for one page attempt
#[derive(Debug, Clone, Default)]
pub struct TrackCapture {
    pub payload: Vec<u8>,
    pub lead_in_start: usize,
    pub lead_in_len: usize,
    pub data_start: usize,
    pub faults: Vec<PageFault>,
}

/// Bit timing state for the page being decoded.
///
/// Replaced wholesale at every page boundary and every filter retry.
#[derive(Debug, Clone, Default)]
pub struct TrackDecoder {
    last_bit: u8,
    track_started: bool,
    zero_run: usize,
    zero_run_start: usize,
    lead_in_start: usize,
    lead_in_len: usize,
    data_start: Option<usize>,
    assembler: ByteAssembler,
    payload: Vec<u8>,
    faults: Vec<PageFault>,
}

impl TrackDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_track_started(&self) -> bool {
        self.track_started
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Where the track start marker was seen in this attempt
    pub fn data_start(&self) -> Option<usize> {
        self.data_start
    }

    pub fn is_failed(&self) -> bool {
        !self.faults.is_empty()
    }

    /// A page worth re-decoding with a filter: damaged data, or a payload
    /// that does not start with the page header byte.
    pub fn is_invalid(&self, config: &DecoderConfig) -> bool {
        self.is_failed()
            || self
                .payload
                .first()
                .is_some_and(|&byte| byte != config.page_header)
    }

    /// Handle one accepted clock at `position`, `gap` samples after the
    /// previous one.
    pub fn on_clock(
        &mut self,
        gap: usize,
        position: usize,
        config: &DecoderConfig,
    ) -> ClockOutcome {
        let outcome = match classify_gap(gap, config) {
            GapClass::Spurious => ClockOutcome::Continue,
            GapClass::HardBoundary => return ClockOutcome::PageBoundary { hard: true },
            GapClass::SyncLoss => return ClockOutcome::PageBoundary { hard: false },
            GapClass::Oversized => {
                if self.track_started {
                    self.fail(PageFault::SyncLoss { position })
                } else {
                    ClockOutcome::Continue
                }
            }
            GapClass::Cell(length) => self.decode_cell(length, position, config),
        };

        if !self.track_started {
            self.last_bit = 0;
        }
        outcome
    }

    fn decode_cell(
        &mut self,
        length: CellLength,
        position: usize,
        config: &DecoderConfig,
    ) -> ClockOutcome {
        let emitted = match (self.last_bit, length) {
            (1, CellLength::Short) => self.emit(&[1], position),
            (1, CellLength::Medium) => self.emit(&[0, 0], position),
            (1, CellLength::Long) => self.emit(&[0, 1], position),
            (_, CellLength::Short) => {
                if !self.track_started {
                    if self.zero_run == 0 {
                        self.zero_run_start = position;
                    }
                    self.zero_run += 1;
                }
                self.emit(&[0], position)
            }
            (_, CellLength::Medium) => {
                if self.track_started {
                    self.emit(&[1], position)
                } else if self.zero_run > config.lead_in_min_zeros {
                    self.start_track(position);
                    return ClockOutcome::TrackStart;
                } else {
                    // Not enough lead-in: treat the 1 as noise
                    self.zero_run = 0;
                    self.last_bit = 0;
                    None
                }
            }
            (_, CellLength::Long) => {
                self.zero_run = 0;
                if self.track_started {
                    Some(PageFault::IllegalCellAfterZero { position })
                } else {
                    None
                }
            }
        };

        match emitted {
            Some(fault) => self.fail(fault),
            None => ClockOutcome::Continue,
        }
    }

    fn start_track(&mut self, position: usize) {
        log::debug!("Started new data track at: {}", position);
        self.track_started = true;
        self.lead_in_start = self.zero_run_start;
        self.lead_in_len = self.zero_run;
        self.data_start.get_or_insert(position);
        self.zero_run = 0;
        self.assembler.arm();
        self.last_bit = 1;
    }

    /// Push bits to the assembler; returns the first fault raised
    fn emit(&mut self, bits: &[u8], position: usize) -> Option<PageFault> {
        let mut first_fault = None;
        for &bit in bits {
            if self.track_started {
                match self.assembler.push(bit, position) {
                    Ok(Some(byte)) => self.payload.push(byte),
                    Ok(None) => {}
                    Err(fault) => {
                        first_fault.get_or_insert(fault);
                    }
                }
            }
            self.last_bit = bit;
        }
        first_fault
    }

    fn fail(&mut self, fault: PageFault) -> ClockOutcome {
        self.faults.push(fault.clone());
        ClockOutcome::PageInvalid(fault)
    }

    /// Hand over what was decoded and start from a clean state
    pub fn take(&mut self) -> TrackCapture {
        let state = std::mem::take(self);
        TrackCapture {
            payload: state.payload,
            lead_in_start: state.lead_in_start,
            lead_in_len: state.lead_in_len,
            data_start: state.data_start.unwrap_or(0),
            faults: state.faults,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: usize = 9;
    const MEDIUM: usize = 13;
    const LONG: usize = 18;

    /// Feed gaps starting at position 1000 and collect the outcomes
    fn run(decoder: &mut TrackDecoder, gaps: &[usize]) -> Vec<ClockOutcome> {
        let config = DecoderConfig::default();
        let mut position = 1000;
        gaps.iter()
            .map(|&gap| {
                position += gap;
                decoder.on_clock(gap, position, &config)
            })
            .collect()
    }

    fn lead_in(zeros: usize) -> Vec<usize> {
        let mut gaps = vec![SHORT; zeros];
        gaps.push(MEDIUM);
        gaps
    }

    #[test]
    fn test_classify_bands() {
        let config = DecoderConfig::default();
        assert_eq!(classify_gap(5, &config), GapClass::Spurious);
        assert_eq!(classify_gap(6, &config), GapClass::Cell(CellLength::Short));
        assert_eq!(classify_gap(11, &config), GapClass::Cell(CellLength::Short));
        assert_eq!(classify_gap(12, &config), GapClass::Cell(CellLength::Medium));
        assert_eq!(classify_gap(15, &config), GapClass::Cell(CellLength::Medium));
        assert_eq!(classify_gap(16, &config), GapClass::Cell(CellLength::Long));
        assert_eq!(classify_gap(20, &config), GapClass::Cell(CellLength::Long));
        assert_eq!(classify_gap(21, &config), GapClass::Oversized);
        assert_eq!(classify_gap(1000, &config), GapClass::Oversized);
        assert_eq!(classify_gap(1001, &config), GapClass::SyncLoss);
        assert_eq!(classify_gap(70000, &config), GapClass::SyncLoss);
        assert_eq!(classify_gap(70001, &config), GapClass::HardBoundary);
    }

    #[test]
    fn test_track_start_needs_long_lead_in() {
        let mut decoder = TrackDecoder::new();
        let outcomes = run(&mut decoder, &lead_in(10));
        assert!(!decoder.is_track_started());
        assert!(outcomes.iter().all(|o| *o == ClockOutcome::Continue));

        let mut decoder = TrackDecoder::new();
        let outcomes = run(&mut decoder, &lead_in(11));
        assert!(decoder.is_track_started());
        assert_eq!(outcomes.last(), Some(&ClockOutcome::TrackStart));
    }

    #[test]
    fn test_rejected_start_restarts_zero_run() {
        let mut decoder = TrackDecoder::new();
        // 6 zeros, a premature 1, then only 6 more zeros: never enough
        let mut gaps = lead_in(6);
        gaps.extend(lead_in(6));
        run(&mut decoder, &gaps);
        assert!(!decoder.is_track_started());

        // The rejected 1 left the last bit at 0, so short cells are still zeros
        run(&mut decoder, &lead_in(11));
        assert!(decoder.is_track_started());
    }

    #[test]
    fn test_lead_in_and_data_start_positions() {
        let mut decoder = TrackDecoder::new();
        run(&mut decoder, &[MEDIUM]);
        run(&mut decoder, &lead_in(12));
        let capture = decoder.take();
        // Positions start at 1000; the first zero of the second run is at 1000 + SHORT
        assert_eq!(capture.lead_in_start, 1000 + SHORT);
        assert_eq!(capture.lead_in_len, 12);
        assert_eq!(capture.data_start, 1000 + 12 * SHORT + MEDIUM);
    }

    #[test]
    fn test_decodes_header_byte() {
        // After the start marker: 0 | 1 1 0 0 0 1 0 1 (0xC5), then a trailing framing 0
        // prev=1: long -> 0 1; short -> 1; medium -> 0 0; prev=0: short -> 0; medium -> 1;
        // prev=1: long -> 0 1; medium -> 0 0
        let mut decoder = TrackDecoder::new();
        let mut gaps = lead_in(16);
        gaps.extend([LONG, SHORT, MEDIUM, SHORT, MEDIUM, LONG, MEDIUM]);
        let outcomes = run(&mut decoder, &gaps);

        assert!(outcomes.iter().all(|o| !matches!(o, ClockOutcome::PageInvalid(_))));
        assert_eq!(decoder.payload(), &[0xC5]);
        assert!(!decoder.is_invalid(&DecoderConfig::default()));
    }

    #[test]
    fn test_illegal_long_cell_after_zero() {
        let mut decoder = TrackDecoder::new();
        let mut gaps = lead_in(16);
        // 0 0 from medium, then a long cell after a 0
        gaps.extend([MEDIUM, LONG]);
        let outcomes = run(&mut decoder, &gaps);
        assert!(matches!(
            outcomes.last(),
            Some(ClockOutcome::PageInvalid(PageFault::IllegalCellAfterZero { .. }))
        ));
        assert!(decoder.is_failed());
    }

    #[test]
    fn test_long_cell_in_lead_in_is_harmless() {
        let mut decoder = TrackDecoder::new();
        let mut gaps = vec![SHORT; 12];
        gaps.push(LONG);
        gaps.extend(lead_in(11));
        let outcomes = run(&mut decoder, &gaps);
        assert!(decoder.is_track_started());
        assert!(!decoder.is_failed());
        assert!(outcomes.iter().all(|o| !matches!(o, ClockOutcome::PageInvalid(_))));
    }

    #[test]
    fn test_long_cell_in_lead_in_restarts_zero_run() {
        // 6 + 6 zeros would be enough together, but the long cell splits them
        let mut decoder = TrackDecoder::new();
        let mut gaps = vec![SHORT; 6];
        gaps.push(LONG);
        gaps.extend(lead_in(6));
        let outcomes = run(&mut decoder, &gaps);
        assert!(!decoder.is_track_started());
        assert!(outcomes.iter().all(|o| *o == ClockOutcome::Continue));
    }

    #[test]
    fn test_oversized_gap_only_counts_inside_track() {
        let mut decoder = TrackDecoder::new();
        run(&mut decoder, &[500]);
        assert!(!decoder.is_failed());

        run(&mut decoder, &lead_in(11));
        let outcomes = run(&mut decoder, &[500]);
        assert!(matches!(
            outcomes[0],
            ClockOutcome::PageInvalid(PageFault::SyncLoss { .. })
        ));
        assert!(decoder.is_failed());
    }

    #[test]
    fn test_framing_violation_marks_page() {
        let mut decoder = TrackDecoder::new();
        let mut gaps = lead_in(11);
        // prev=1, short -> 1 where the framing 0 is expected
        gaps.push(SHORT);
        let outcomes = run(&mut decoder, &gaps);
        assert!(matches!(
            outcomes.last(),
            Some(ClockOutcome::PageInvalid(PageFault::FramingViolation { .. }))
        ));
    }

    #[test]
    fn test_boundaries_reported() {
        let mut decoder = TrackDecoder::new();
        assert_eq!(run(&mut decoder, &[5000]), vec![ClockOutcome::PageBoundary { hard: false }]);
        assert_eq!(run(&mut decoder, &[80000]), vec![ClockOutcome::PageBoundary { hard: true }]);
    }

    #[test]
    fn test_take_resets_state() {
        let mut decoder = TrackDecoder::new();
        let mut gaps = lead_in(16);
        gaps.extend([LONG, SHORT, MEDIUM, SHORT, MEDIUM, LONG, MEDIUM]);
        run(&mut decoder, &gaps);

        let capture = decoder.take();
        assert_eq!(capture.payload, vec![0xC5]);
        assert!(!decoder.is_track_started());
        assert!(decoder.payload().is_empty());
    }

    #[test]
    fn test_wrong_header_is_invalid() {
        // 0x00: framing 0 then eight zeros. prev=1 medium -> 0 0, then 7 short zeros
        let mut decoder = TrackDecoder::new();
        let mut gaps = lead_in(11);
        gaps.push(MEDIUM);
        gaps.extend([SHORT; 7]);
        run(&mut decoder, &gaps);
        assert_eq!(decoder.payload(), &[0x00]);
        assert!(!decoder.is_failed());
        assert!(decoder.is_invalid(&DecoderConfig::default()));
    }
}
