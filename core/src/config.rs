use crate::{
    AMPLITUDE_THRESHOLD, CELL_MAX, CLOCK_PROBE_DISTANCE, FILTER_STEP_HZ, HARD_BOUNDARY_GAP,
    LEAD_IN_MIN_ZEROS, MAX_RETRIES, MEDIUM_CELL_MAX, MIN_CLOCK_GAP, PAGE_HEADER_BYTE,
    PAGE_ID_OFFSET, SAMPLE_RATE, SHORT_CELL_MAX, SYNC_LOSS_GAP,
};

/// Thresholds used by the decoder.
///
/// All values were tuned against real 44.1 kHz captures of Studybox tapes.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Sample rate the filter coefficients are computed for (Hz)
    pub sample_rate: u32,
    /// Minimum swing between a clock sample and its probes
    pub amplitude_threshold: i32,
    /// Distance of the probes on each side of a candidate clock
    pub probe_distance: usize,
    /// Clocks closer than this to the previous one are noise
    pub min_clock_gap: usize,
    /// Upper bound of the short cell band (inclusive)
    pub short_cell_max: usize,
    /// Upper bound of the medium cell band (inclusive)
    pub medium_cell_max: usize,
    /// Upper bound of the long cell band (inclusive)
    pub cell_max: usize,
    /// Gaps above this end the current page (soft boundary)
    pub sync_loss_gap: usize,
    /// Gaps above this are silence between pages (hard boundary)
    pub hard_boundary_gap: usize,
    /// A track start needs a lead-in zero run longer than this
    pub lead_in_min_zeros: usize,
    /// Filtered re-decodes attempted before an invalid page is accepted
    pub max_retries: u32,
    /// High-pass cutoff added per retry (Hz)
    pub filter_step_hz: u32,
    /// First payload byte of every valid page
    pub page_header: u8,
    /// Offset of the page number inside the payload
    pub page_id_offset: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            amplitude_threshold: AMPLITUDE_THRESHOLD,
            probe_distance: CLOCK_PROBE_DISTANCE,
            min_clock_gap: MIN_CLOCK_GAP,
            short_cell_max: SHORT_CELL_MAX,
            medium_cell_max: MEDIUM_CELL_MAX,
            cell_max: CELL_MAX,
            sync_loss_gap: SYNC_LOSS_GAP,
            hard_boundary_gap: HARD_BOUNDARY_GAP,
            lead_in_min_zeros: LEAD_IN_MIN_ZEROS,
            max_retries: MAX_RETRIES,
            filter_step_hz: FILTER_STEP_HZ,
            page_header: PAGE_HEADER_BYTE,
            page_id_offset: PAGE_ID_OFFSET,
        }
    }
}

impl DecoderConfig {
    /// Cutoff frequency used for the given retry attempt (0 = unfiltered)
    pub fn cutoff_for_retry(&self, retry: u32) -> u32 {
        self.filter_step_hz * retry
    }
}
